// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SwupddError {
    /// A job is already running; the request was not accepted.
    #[error("another request is already in progress")]
    Busy,

    /// `cancel` was called while no job was running.
    #[error("no active request to cancel")]
    NoActiveJob,

    #[error("invalid option '{name}': {reason}")]
    InvalidOption { name: String, reason: String },

    /// Only produced when unknown options are configured to be rejected.
    #[error("unknown option '{0}'")]
    UnknownOption(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// The daemon turned a call down; carries its reason.
    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SwupddError {
    pub(crate) fn invalid_option(name: &str, reason: impl Into<String>) -> Self {
        SwupddError::InvalidOption {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, SwupddError>;
