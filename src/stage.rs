//! Output tree staging
//!
//! Every run starts from a fresh copy of the build artifacts so no file from a
//! previous run can survive into the new output.

use crate::{Error, Result, RunConfig};
use log::info;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Reset the output and screenshot directories for a new run.
///
/// The output directory is removed and re-seeded from `config.source_dir`; the
/// screenshot directory is removed and recreated empty. Any failure is fatal.
pub fn prepare(config: &RunConfig) -> Result<()> {
    if !config.source_dir.is_dir() {
        return Err(Error::Setup(format!(
            "source directory {} does not exist",
            config.source_dir.display()
        )));
    }

    reset_dir(&config.output_dir)?;
    copy_tree(&config.source_dir, &config.output_dir)?;
    info!(
        "Staged {} -> {}",
        config.source_dir.display(),
        config.output_dir.display()
    );

    reset_dir(&config.screenshot_dir)?;
    fs::create_dir_all(&config.screenshot_dir).map_err(|e| {
        Error::Setup(format!("failed to create {}: {}", config.screenshot_dir.display(), e))
    })?;
    Ok(())
}

/// Replace `source_dir` with the contents of `output_dir`.
///
/// This is the promotion step run after a successful prerender so that the
/// deployable tree carries the static entry points.
pub fn publish(config: &RunConfig) -> Result<()> {
    if !config.output_dir.is_dir() {
        return Err(Error::Setup(format!(
            "nothing to publish: {} does not exist",
            config.output_dir.display()
        )));
    }
    reset_dir(&config.source_dir)?;
    copy_tree(&config.output_dir, &config.source_dir)?;
    info!(
        "Published {} -> {}",
        config.output_dir.display(),
        config.source_dir.display()
    );
    Ok(())
}

fn reset_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)
            .map_err(|e| Error::Setup(format!("failed to clean {}: {}", dir.display(), e)))?;
    }
    Ok(())
}

/// Recursively copy `src` into `dst`, creating `dst`.
pub(crate) fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)
        .map_err(|e| Error::Setup(format!("failed to create {}: {}", dst.display(), e)))?;

    for entry in WalkDir::new(src).min_depth(1).follow_links(true) {
        let entry = entry.map_err(|e| Error::Setup(format!("failed to walk {}: {}", src.display(), e)))?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| Error::Setup(format!("unexpected path {}: {}", entry.path().display(), e)))?;
        let target = dst.join(rel);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .map_err(|e| Error::Setup(format!("failed to create {}: {}", target.display(), e)))?;
        } else {
            fs::copy(entry.path(), &target).map_err(|e| {
                Error::Setup(format!(
                    "failed to copy {} -> {}: {}",
                    entry.path().display(),
                    target.display(),
                    e
                ))
            })?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(root: &Path) -> RunConfig {
        let source = root.join("dist");
        fs::create_dir_all(source.join("assets")).unwrap();
        fs::write(source.join("index.html"), "<html></html>").unwrap();
        fs::write(source.join("assets/app.js"), "console.log(1)").unwrap();
        RunConfig {
            source_dir: source,
            output_dir: root.join("dist-seo"),
            screenshot_dir: root.join("dist-seo-view"),
            ..Default::default()
        }
    }

    #[test]
    fn prepare_copies_tree_and_clears_stale_files() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = layout(tmp.path());

        fs::create_dir_all(cfg.output_dir.join("old")).unwrap();
        fs::write(cfg.output_dir.join("old/index.html"), "stale").unwrap();
        fs::create_dir_all(&cfg.screenshot_dir).unwrap();
        fs::write(cfg.screenshot_dir.join("root.png"), "stale").unwrap();

        prepare(&cfg).unwrap();

        assert!(cfg.output_dir.join("index.html").is_file());
        assert_eq!(
            fs::read_to_string(cfg.output_dir.join("assets/app.js")).unwrap(),
            "console.log(1)"
        );
        assert!(!cfg.output_dir.join("old").exists());
        assert!(cfg.screenshot_dir.is_dir());
        assert_eq!(fs::read_dir(&cfg.screenshot_dir).unwrap().count(), 0);
    }

    #[test]
    fn missing_source_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = RunConfig {
            source_dir: tmp.path().join("missing"),
            output_dir: tmp.path().join("out"),
            screenshot_dir: tmp.path().join("shots"),
            ..Default::default()
        };
        let err = prepare(&cfg).unwrap_err();
        assert!(err.is_fatal());
        assert!(!cfg.output_dir.exists());
    }

    #[test]
    fn publish_replaces_source_with_output() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = layout(tmp.path());
        prepare(&cfg).unwrap();
        fs::create_dir_all(cfg.output_dir.join("fr")).unwrap();
        fs::write(cfg.output_dir.join("fr/index.html"), "fr").unwrap();

        publish(&cfg).unwrap();

        assert_eq!(fs::read_to_string(cfg.source_dir.join("fr/index.html")).unwrap(), "fr");
        assert!(cfg.source_dir.join("assets/app.js").is_file());
    }
}
