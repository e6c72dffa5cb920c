use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Operations exposed on the bus.
///
/// Every variant except [`MethodKind::Cancel`] maps onto one subcommand of
/// the external update tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MethodKind {
    CheckUpdate,
    Update,
    Verify,
    BundleAdd,
    BundleRemove,
    HashDump,
    Cancel,
}

impl MethodKind {
    pub const ALL: [MethodKind; 7] = [
        MethodKind::CheckUpdate,
        MethodKind::Update,
        MethodKind::Verify,
        MethodKind::BundleAdd,
        MethodKind::BundleRemove,
        MethodKind::HashDump,
        MethodKind::Cancel,
    ];

    /// Name used on the bus, both for calls and in completion signals.
    pub fn wire_name(self) -> &'static str {
        match self {
            MethodKind::CheckUpdate => "checkUpdate",
            MethodKind::Update => "update",
            MethodKind::Verify => "verify",
            MethodKind::BundleAdd => "bundleAdd",
            MethodKind::BundleRemove => "bundleRemove",
            MethodKind::HashDump => "hashDump",
            MethodKind::Cancel => "cancel",
        }
    }

    /// Subcommand token passed to the update tool. `None` for `Cancel`,
    /// which never spawns anything.
    pub fn subcommand(self) -> Option<&'static str> {
        match self {
            MethodKind::CheckUpdate => Some("check-update"),
            MethodKind::Update => Some("update"),
            MethodKind::Verify => Some("verify"),
            MethodKind::BundleAdd => Some("bundle-add"),
            MethodKind::BundleRemove => Some("bundle-remove"),
            MethodKind::HashDump => Some("hashdump"),
            MethodKind::Cancel => None,
        }
    }
}

impl fmt::Display for MethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for MethodKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MethodKind::ALL
            .into_iter()
            .find(|m| m.wire_name() == s)
            .ok_or_else(|| format!("unknown method: {s}"))
    }
}

/// A single option value as received from a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Boolean(bool),
    Integer(i64),
    String(String),
}

impl OptionValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            OptionValue::Boolean(_) => "boolean",
            OptionValue::Integer(_) => "integer",
            OptionValue::String(_) => "string",
        }
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::String(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::String(value)
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Boolean(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        OptionValue::Integer(value)
    }
}

/// Per-call options plus positional arguments (bundle names, file names).
///
/// Built fresh for every incoming call and only read afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestOptions {
    #[serde(default)]
    pub options: BTreeMap<String, OptionValue>,
    #[serde(default)]
    pub args: Vec<String>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.options.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.options.contains_key(name)
    }

    pub fn with_option(mut self, name: &str, value: impl Into<OptionValue>) -> Self {
        self.options.insert(name.to_string(), value.into());
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

/// What to do with option names a method does not recognise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownOptionPolicy {
    /// Skip them silently, so newer callers keep working.
    #[default]
    Ignore,
    /// Fail the call with `UnknownOption`.
    Reject,
}

impl FromStr for UnknownOptionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ignore" => Ok(UnknownOptionPolicy::Ignore),
            "reject" => Ok(UnknownOptionPolicy::Reject),
            other => Err(format!(
                "invalid unknown_options: {other} (expected \"ignore\" or \"reject\")"
            )),
        }
    }
}

/// Program name, subcommand, flags and positionals for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentVector(Vec<String>);

impl ArgumentVector {
    pub fn new(tokens: Vec<String>) -> Self {
        Self(tokens)
    }

    pub fn program(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    /// Everything after the program name.
    pub fn args(&self) -> &[String] {
        self.0.get(1..).unwrap_or(&[])
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl fmt::Display for ArgumentVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(" "))
    }
}
