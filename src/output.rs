//! Path rewriting and entry-point persistence

use crate::{Error, LocaleKey, Result, RunConfig};
use log::info;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::OnceLock;

/// A persisted entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenEntry {
    pub path: PathBuf,
    /// Hex SHA-256 of the bytes written
    pub sha256: String,
}

fn root_relative() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // `href="/x"` or `src="/x"` as a whole attribute; `//host` is left alone.
    RE.get_or_init(|| Regex::new(r#"(\s)(href|src)="/([^/])"#).expect("static regex"))
}

/// Turn root-relative `href`/`src` values into parent-relative ones.
///
/// Used for locale entry points, which live one directory below the root.
/// Absolute and protocol-relative URLs and attributes that merely end in
/// `href`/`src` (such as `data-href`) are untouched.
pub fn rewrite_root_relative(html: &str) -> String {
    root_relative()
        .replace_all(html, r#"${1}${2}="../${3}"#)
        .into_owned()
}

/// Where the entry point for `locale` lives.
pub fn entry_path(config: &RunConfig, locale: &LocaleKey) -> PathBuf {
    if locale.is_root() {
        config.output_dir.join(&config.entry_file)
    } else {
        config.output_dir.join(locale.as_str()).join(&config.entry_file)
    }
}

/// Write the sanitized document for `locale`, rewriting paths for nested locales.
pub fn finalize(config: &RunConfig, locale: &LocaleKey, html: &str) -> Result<WrittenEntry> {
    let html = if locale.is_root() {
        html.to_string()
    } else {
        rewrite_root_relative(html)
    };

    let path = entry_path(config, locale);
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| Error::write(dir, e))?;
    }
    std::fs::write(&path, html.as_bytes()).map_err(|e| Error::write(&path, e))?;

    let sha256 = hex::encode(Sha256::digest(html.as_bytes()));
    info!("Wrote {} ({})", path.display(), &sha256[..12]);
    Ok(WrittenEntry { path, sha256 })
}
