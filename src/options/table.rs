// src/options/table.rs

//! Declarative per-method option tables.

use crate::types::MethodKind;

/// Positional arguments a method expects after its flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Positionals {
    /// No positional arguments.
    None,
    /// Exactly one argument, named for diagnostics.
    One(&'static str),
    /// Any number of arguments, passed through in order.
    Many(&'static str),
}

/// Options recognised by one method.
///
/// The string and boolean lists are disjoint. `port` is handled separately
/// because it is the only integer option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionSpec {
    pub string_options: &'static [&'static str],
    pub bool_options: &'static [&'static str],
    pub accepts_port: bool,
    pub positionals: Positionals,
}

pub const PORT_OPTION: &str = "port";

const CHECK_UPDATE: OptionSpec = OptionSpec {
    string_options: &["url"],
    bool_options: &[],
    accepts_port: false,
    positionals: Positionals::One("bundle"),
};

const UPDATE: OptionSpec = OptionSpec {
    string_options: &["url", "contenturl", "versionurl", "format", "path", "statedir"],
    bool_options: &["download", "status", "force"],
    accepts_port: true,
    positionals: Positionals::None,
};

const VERIFY: OptionSpec = OptionSpec {
    string_options: &["url", "contenturl", "versionurl", "manifest"],
    bool_options: &["fix", "install", "quick", "force"],
    accepts_port: true,
    positionals: Positionals::None,
};

const BUNDLE_ADD: OptionSpec = OptionSpec {
    string_options: &["url", "contenturl", "versionurl", "format", "path", "statedir"],
    bool_options: &["list", "force"],
    accepts_port: true,
    positionals: Positionals::Many("bundle"),
};

const BUNDLE_REMOVE: OptionSpec = OptionSpec {
    string_options: &["url"],
    bool_options: &[],
    accepts_port: false,
    positionals: Positionals::One("bundle"),
};

const HASH_DUMP: OptionSpec = OptionSpec {
    string_options: &["url"],
    bool_options: &[],
    accepts_port: false,
    positionals: Positionals::One("filename"),
};

const CANCEL: OptionSpec = OptionSpec {
    string_options: &[],
    bool_options: &["force"],
    accepts_port: false,
    positionals: Positionals::None,
};

impl OptionSpec {
    pub fn for_method(method: MethodKind) -> &'static OptionSpec {
        match method {
            MethodKind::CheckUpdate => &CHECK_UPDATE,
            MethodKind::Update => &UPDATE,
            MethodKind::Verify => &VERIFY,
            MethodKind::BundleAdd => &BUNDLE_ADD,
            MethodKind::BundleRemove => &BUNDLE_REMOVE,
            MethodKind::HashDump => &HASH_DUMP,
            MethodKind::Cancel => &CANCEL,
        }
    }

    pub fn accepts_string(&self, name: &str) -> bool {
        self.string_options.contains(&name)
    }

    pub fn accepts_bool(&self, name: &str) -> bool {
        self.bool_options.contains(&name)
    }

    /// True if `name` is handled by any of this method's option kinds.
    pub fn recognizes(&self, name: &str) -> bool {
        self.accepts_string(name)
            || self.accepts_bool(name)
            || (self.accepts_port && name == PORT_OPTION)
    }
}
