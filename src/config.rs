//! Run configuration
//!
//! `RunConfig` is resolved once at startup and never mutated afterwards. It can
//! be built from defaults, a JSON file, or both, with CLI flags layered on top
//! by the binary.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Viewport dimensions used for the browser window and screenshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Configuration for a single prerender run
///
/// The defaults mirror a typical Vite layout: the build lands in `dist`, the
/// prerendered tree in `dist-seo` and the verification screenshots in
/// `dist-seo-view`.
///
/// # Examples
///
/// ```
/// let cfg = prerender::RunConfig::default();
/// assert_eq!(cfg.port, 4173);
/// assert_eq!(cfg.root_selector, "#root");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Loopback port the staged tree is served on
    pub port: u16,
    /// Built static asset tree
    pub source_dir: PathBuf,
    /// Destination of the prerendered tree (recreated every run)
    pub output_dir: PathBuf,
    /// Destination of the verification screenshots (recreated every run)
    pub screenshot_dir: PathBuf,
    /// Directory holding one definition file per locale
    pub locale_dir: PathBuf,
    /// Extension (without dot) of locale definition files
    pub locale_extension: String,
    /// Stem of the aggregate locale file that is never rendered
    pub excluded_locale: String,
    /// CSS selector of the node the application populates when ready
    pub root_selector: String,
    /// Upper bound on the readiness wait, in milliseconds
    pub ready_timeout_ms: u64,
    /// Delay between readiness probes, in milliseconds
    pub ready_poll_interval_ms: u64,
    /// Default timeout the engine applies to navigation, in milliseconds
    pub navigation_timeout_ms: u64,
    /// Query parameter the application reads its locale from
    pub locale_query_param: String,
    /// File name of each written entry point
    pub entry_file: String,
    /// Screenshot file stem used for the default locale
    pub root_screenshot_name: String,
    pub viewport: Viewport,
    /// Explicit browser binary; auto-detected when absent
    pub chrome_path: Option<PathBuf>,
    /// Whether the browser runs with its sandbox enabled
    pub sandbox: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            port: 4173,
            source_dir: PathBuf::from("dist"),
            output_dir: PathBuf::from("dist-seo"),
            screenshot_dir: PathBuf::from("dist-seo-view"),
            locale_dir: PathBuf::from("src/locales"),
            locale_extension: "json".to_string(),
            excluded_locale: "all".to_string(),
            root_selector: "#root".to_string(),
            ready_timeout_ms: 10_000,
            ready_poll_interval_ms: 100,
            navigation_timeout_ms: 30_000,
            locale_query_param: "webLang".to_string(),
            entry_file: "index.html".to_string(),
            root_screenshot_name: "root".to_string(),
            viewport: Viewport::default(),
            chrome_path: None,
            sandbox: true,
        }
    }
}

impl RunConfig {
    /// Load a configuration from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("cannot parse {}: {}", path.display(), e)))
    }

    /// Loopback origin the staged tree is served from.
    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}/", self.port)
    }

    /// Check the invariants a run depends on.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(Error::Config("port must be non-zero".into()));
        }
        if self.ready_timeout_ms == 0 {
            return Err(Error::Config("ready_timeout_ms must be non-zero".into()));
        }
        if self.ready_poll_interval_ms == 0 {
            return Err(Error::Config("ready_poll_interval_ms must be non-zero".into()));
        }
        if scraper::Selector::parse(&self.root_selector).is_err() {
            return Err(Error::Config(format!(
                "root_selector `{}` is not a valid CSS selector",
                self.root_selector
            )));
        }
        for (name, value) in [
            ("entry_file", &self.entry_file),
            ("root_screenshot_name", &self.root_screenshot_name),
            ("locale_query_param", &self.locale_query_param),
        ] {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("{} must not be empty", name)));
            }
        }
        if self.entry_file.contains(&['/', '\\'][..]) {
            return Err(Error::Config("entry_file must be a plain file name".into()));
        }

        // Staging deletes both of these trees before every run.
        let wiped = [("output_dir", &self.output_dir), ("screenshot_dir", &self.screenshot_dir)];
        let all = [
            ("source_dir", &self.source_dir),
            ("locale_dir", &self.locale_dir),
            ("output_dir", &self.output_dir),
            ("screenshot_dir", &self.screenshot_dir),
        ];
        for (name, dir) in wiped {
            if nested(dir, &self.source_dir) {
                return Err(Error::Config(format!(
                    "{} {} overlaps source_dir {}",
                    name,
                    dir.display(),
                    self.source_dir.display()
                )));
            }
            for (other_name, other) in all {
                if other_name != name && nested(other, dir) {
                    return Err(Error::Config(format!(
                        "{} {} lies inside {} {}, which is wiped on every run",
                        other_name,
                        other.display(),
                        name,
                        dir.display()
                    )));
                }
            }
        }
        Ok(())
    }
}

/// True when `inner` is `outer` or lives below it, compared lexically.
fn nested(inner: &Path, outer: &Path) -> bool {
    let inner = lexical(inner);
    let outer = lexical(outer);
    inner.starts_with(&outer)
}

fn lexical(path: &Path) -> PathBuf {
    let base = if path.is_absolute() {
        PathBuf::new()
    } else {
        std::env::current_dir().unwrap_or_default()
    };
    let mut out = base;
    for comp in path.components() {
        match comp {
            std::path::Component::CurDir => {}
            std::path::Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
