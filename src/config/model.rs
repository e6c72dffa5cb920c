// src/config/model.rs

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::types::UnknownOptionPolicy;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [daemon]
/// program = "swupd"
/// socket_path = "/run/swupdd.sock"
/// default_url = "https://cdn.example.org/update"
/// unknown_options = "ignore"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub daemon: DaemonSection,
}

/// Validated configuration. Build it from a [`RawConfigFile`] with
/// `ConfigFile::try_from`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    daemon: DaemonSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(daemon: DaemonSection) -> Self {
        Self { daemon }
    }

    pub fn daemon(&self) -> &DaemonSection {
        &self.daemon
    }

    pub fn program(&self) -> &str {
        &self.daemon.program
    }

    pub fn socket_path(&self) -> &Path {
        &self.daemon.socket_path
    }

    pub fn default_url(&self) -> Option<&str> {
        self.daemon.default_url.as_deref()
    }

    pub fn unknown_options(&self) -> UnknownOptionPolicy {
        self.daemon.unknown_options
    }
}

/// `[daemon]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct DaemonSection {
    /// Update tool to launch; looked up on `PATH` when not absolute.
    #[serde(default = "default_program")]
    pub program: String,

    /// Where the bus socket is bound.
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,

    /// Appended as `--url=<default>` when a caller gives no `url`.
    #[serde(default)]
    pub default_url: Option<String>,

    /// `"ignore"` (default) or `"reject"`.
    #[serde(default)]
    pub unknown_options: UnknownOptionPolicy,
}

pub(crate) fn default_program() -> String {
    "swupd".to_string()
}

pub(crate) fn default_socket_path() -> PathBuf {
    PathBuf::from("/run/swupdd.sock")
}

impl Default for DaemonSection {
    fn default() -> Self {
        Self {
            program: default_program(),
            socket_path: default_socket_path(),
            default_url: None,
            unknown_options: UnknownOptionPolicy::default(),
        }
    }
}
