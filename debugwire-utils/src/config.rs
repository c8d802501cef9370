//! Configuration file loading
//!
//! Every crate reads its own section of the shared `config.toml`. Sections
//! are optional; absent keys fall back to the section type's `Default`.

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::{paths, DebugwireError, Result};

/// Read one top-level table of a TOML config file.
///
/// A missing file or missing section yields `T::default()`. A file that
/// exists but does not parse is an error.
pub fn load_section<T>(path: &Path, section: &str) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        tracing::debug!("Config file {} not found, using defaults", path.display());
        return Ok(T::default());
    }

    let content = std::fs::read_to_string(path).map_err(|e| DebugwireError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse_section(&content, section).map_err(|message| DebugwireError::ConfigInvalid {
        path: path.to_path_buf(),
        message,
    })
}

/// Like [`load_section`] against the default config file, but never fails:
/// a broken file is logged and defaults are used.
pub fn load_or_default<T>(section: &str) -> T
where
    T: DeserializeOwned + Default,
{
    let path = paths::config_file();
    match load_section(&path, section) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("Failed to load [{}] from config: {}, using defaults", section, e);
            T::default()
        }
    }
}

fn parse_section<T>(content: &str, section: &str) -> std::result::Result<T, String>
where
    T: DeserializeOwned + Default,
{
    let mut table: toml::Table = toml::from_str(content).map_err(|e| e.to_string())?;
    match table.remove(section) {
        Some(value) => value.try_into().map_err(|e: toml::de::Error| e.to_string()),
        None => Ok(T::default()),
    }
}
