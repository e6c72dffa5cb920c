#![allow(dead_code)]

use std::path::PathBuf;

use swupdd::config::{ConfigFile, DaemonSection, RawConfigFile};
use swupdd::engine::MethodCall;
use swupdd::types::{MethodKind, OptionValue, RequestOptions, UnknownOptionPolicy};

/// Builder for `MethodCall` to simplify test setup.
pub struct CallBuilder {
    method: MethodKind,
    request: RequestOptions,
}

impl CallBuilder {
    pub fn new(method: MethodKind) -> Self {
        Self {
            method,
            request: RequestOptions::new(),
        }
    }

    pub fn string(self, name: &str, value: &str) -> Self {
        self.option(name, value)
    }

    pub fn flag(self, name: &str, value: bool) -> Self {
        self.option(name, value)
    }

    pub fn integer(self, name: &str, value: i64) -> Self {
        self.option(name, value)
    }

    pub fn option(mut self, name: &str, value: impl Into<OptionValue>) -> Self {
        self.request = self.request.with_option(name, value);
        self
    }

    pub fn arg(mut self, arg: &str) -> Self {
        self.request = self.request.with_args([arg]);
        self
    }

    pub fn request(&self) -> &RequestOptions {
        &self.request
    }

    pub fn build(self) -> MethodCall {
        MethodCall::new(self.method, self.request)
    }
}

/// Builder for `ConfigFile`.
pub struct ConfigFileBuilder {
    daemon: DaemonSection,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            daemon: DaemonSection::default(),
        }
    }

    pub fn program(mut self, program: &str) -> Self {
        self.daemon.program = program.to_string();
        self
    }

    pub fn socket_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.daemon.socket_path = path.into();
        self
    }

    pub fn default_url(mut self, url: &str) -> Self {
        self.daemon.default_url = Some(url.to_string());
        self
    }

    pub fn unknown_options(mut self, policy: UnknownOptionPolicy) -> Self {
        self.daemon.unknown_options = policy;
        self
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(RawConfigFile {
            daemon: self.daemon,
        })
        .expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}
