//! Locale enumeration

use crate::{Error, Result, RunConfig};
use log::{debug, warn};
use std::fmt;
use std::path::Path;

/// Identifier of a locale variant. The empty key is the default (root) variant.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct LocaleKey(String);

impl LocaleKey {
    /// The default (root) variant.
    pub fn root() -> Self {
        LocaleKey(String::new())
    }

    pub fn new(key: impl Into<String>) -> Self {
        LocaleKey(key.into())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocaleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            f.write_str("root")
        } else {
            f.write_str(&self.0)
        }
    }
}

impl From<&str> for LocaleKey {
    fn from(s: &str) -> Self {
        LocaleKey::new(s)
    }
}

/// List the renderable locales found in `config.locale_dir`.
///
/// The default key always comes first; the remaining keys are the file stems of
/// every locale definition file except the excluded aggregate file, sorted and
/// deduplicated.
pub fn list_locales(config: &RunConfig) -> Result<Vec<LocaleKey>> {
    let dir = &config.locale_dir;
    let entries = std::fs::read_dir(dir)
        .map_err(|e| Error::Setup(format!("cannot read locale directory {}: {}", dir.display(), e)))?;

    let mut stems = Vec::new();
    for entry in entries {
        let entry = entry
            .map_err(|e| Error::Setup(format!("cannot read locale directory {}: {}", dir.display(), e)))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(stem) = locale_stem(&path, &config.locale_extension) else {
            continue;
        };
        if stem == config.excluded_locale {
            debug!("Skipping aggregate locale file {}", path.display());
            continue;
        }
        if !is_safe_segment(&stem) {
            warn!("Skipping locale file with unusable name: {}", path.display());
            continue;
        }
        stems.push(stem);
    }

    stems.sort();
    stems.dedup();

    let mut keys = Vec::with_capacity(stems.len() + 1);
    keys.push(LocaleKey::root());
    keys.extend(stems.into_iter().map(LocaleKey));
    Ok(keys)
}

fn locale_stem(path: &Path, extension: &str) -> Option<String> {
    let ext = path.extension()?.to_str()?;
    if !ext.eq_ignore_ascii_case(extension) {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    Some(stem.to_string())
}

// The key doubles as an output directory name and a query value.
fn is_safe_segment(stem: &str) -> bool {
    !stem.is_empty()
        && stem != "."
        && stem != ".."
        && !stem.contains(&['/', '\\'][..])
        && !stem.chars().any(char::is_control)
}
