// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Environment variable supplying the default base URL when the config file
/// does not set one.
pub const DEFAULT_URL_ENV: &str = "SWUPDD_DEFAULT_URL";

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and run validation.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// Load the raw config the daemon starts from.
///
/// - An explicit path must exist.
/// - Without one, [`default_config_path`] is used if present, otherwise
///   built-in defaults.
///
/// `default_url` falls back to [`DEFAULT_URL_ENV`] when the file leaves it
/// unset.
pub fn load_or_default(explicit: Option<&Path>) -> Result<RawConfigFile> {
    let mut raw = match explicit {
        Some(path) => load_from_path(path)?,
        None => {
            let path = default_config_path();
            if path.exists() {
                load_from_path(&path)?
            } else {
                debug!(path = %path.display(), "no config file; using defaults");
                RawConfigFile::default()
            }
        }
    };

    if raw.daemon.default_url.is_none() {
        raw.daemon.default_url = std::env::var(DEFAULT_URL_ENV)
            .ok()
            .filter(|url| !url.trim().is_empty());
    }

    Ok(raw)
}

/// System-wide config location.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("/etc/swupdd.toml")
}
