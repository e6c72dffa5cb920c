// src/config/validate.rs

use crate::config::model::{ConfigFile, DaemonSection, RawConfigFile};
use crate::errors::{Result, SwupddError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::SwupddError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_daemon_section(&raw.daemon)?;
        Ok(ConfigFile::new_unchecked(raw.daemon))
    }
}

fn validate_daemon_section(daemon: &DaemonSection) -> Result<()> {
    if daemon.program.trim().is_empty() {
        return Err(SwupddError::ConfigError(
            "[daemon].program must not be empty".to_string(),
        ));
    }

    if daemon.socket_path.as_os_str().is_empty() {
        return Err(SwupddError::ConfigError(
            "[daemon].socket_path must not be empty".to_string(),
        ));
    }

    if let Some(url) = &daemon.default_url {
        if url.trim().is_empty() {
            return Err(SwupddError::ConfigError(
                "[daemon].default_url must not be empty when set".to_string(),
            ));
        }
    }

    Ok(())
}
