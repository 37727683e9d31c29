//! Verification screenshots

use crate::browser::Page;
use crate::{Error, LocaleKey, Result, RunConfig};
use log::info;
use std::path::PathBuf;

/// `<screenshot_dir>/<root_screenshot_name>.png` for the default locale,
/// `<screenshot_dir>/<locale>.png` otherwise.
pub fn screenshot_path(config: &RunConfig, locale: &LocaleKey) -> PathBuf {
    let stem = if locale.is_root() {
        config.root_screenshot_name.as_str()
    } else {
        locale.as_str()
    };
    config.screenshot_dir.join(format!("{}.png", stem))
}

/// Capture a full-page PNG of the still-open `page` and store it for `locale`.
pub async fn capture(page: &Page, config: &RunConfig, locale: &LocaleKey) -> Result<PathBuf> {
    let png = page.screenshot().await.map_err(|e| match e {
        Error::Screenshot(_) => e,
        other => Error::Screenshot(other.to_string()),
    })?;
    let path = screenshot_path(config, locale);
    tokio::fs::write(&path, &png)
        .await
        .map_err(|e| Error::write(&path, e))?;
    info!("Screenshot saved: {}", path.display());
    Ok(path)
}
