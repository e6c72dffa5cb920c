// src/options/translator.rs

//! Turns a typed request into the argument vector for the update tool.

use tracing::debug;

use crate::errors::{Result, SwupddError};
use crate::options::table::{OptionSpec, PORT_OPTION, Positionals};
use crate::types::{ArgumentVector, MethodKind, OptionValue, RequestOptions, UnknownOptionPolicy};

const URL_OPTION: &str = "url";
const FORCE_OPTION: &str = "force";

/// Builds argument vectors for every job the daemon launches.
///
/// Token order is fixed: program, subcommand, string flags (table order),
/// boolean flags (table order), `--port`, the default `--url` when the caller
/// gave none, then positionals in the order received.
#[derive(Debug, Clone)]
pub struct OptionTranslator {
    program: String,
    default_url: Option<String>,
    unknown_options: UnknownOptionPolicy,
}

impl OptionTranslator {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            default_url: None,
            unknown_options: UnknownOptionPolicy::Ignore,
        }
    }

    pub fn with_default_url(mut self, url: Option<String>) -> Self {
        self.default_url = url;
        self
    }

    pub fn with_unknown_options(mut self, policy: UnknownOptionPolicy) -> Self {
        self.unknown_options = policy;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn default_url(&self) -> Option<&str> {
        self.default_url.as_deref()
    }

    pub fn translate(&self, method: MethodKind, request: &RequestOptions) -> Result<ArgumentVector> {
        let Some(subcommand) = method.subcommand() else {
            return Err(SwupddError::InvalidArguments(format!(
                "'{method}' does not launch the update tool"
            )));
        };
        let spec = OptionSpec::for_method(method);

        self.check_unknown(method, spec, request)?;
        check_positionals(spec, &request.args)?;

        let mut argv = vec![self.program.clone(), subcommand.to_string()];

        for &name in spec.string_options {
            if let Some(value) = request.get(name) {
                argv.push(format!("--{name}={}", expect_string(name, value)?));
            }
        }

        for &name in spec.bool_options {
            if let Some(value) = request.get(name) {
                if expect_bool(name, value)? {
                    argv.push(format!("--{name}"));
                }
            }
        }

        if spec.accepts_port {
            if let Some(value) = request.get(PORT_OPTION) {
                argv.push(format!("--{PORT_OPTION}={}", parse_port(value)?));
            }
        }

        if let Some(url) = &self.default_url {
            if spec.accepts_string(URL_OPTION) && !request.contains(URL_OPTION) {
                argv.push(format!("--{URL_OPTION}={url}"));
            }
        }

        argv.extend(request.args.iter().cloned());

        debug!(method = %method, argv = ?argv, "translated request");
        Ok(ArgumentVector::new(argv))
    }

    /// Reads the `force` flag of a cancel request. Absent means graceful.
    pub fn cancel_force(&self, request: &RequestOptions) -> Result<bool> {
        let spec = OptionSpec::for_method(MethodKind::Cancel);
        self.check_unknown(MethodKind::Cancel, spec, request)?;
        check_positionals(spec, &request.args)?;

        match request.get(FORCE_OPTION) {
            Some(value) => expect_bool(FORCE_OPTION, value),
            None => Ok(false),
        }
    }

    fn check_unknown(
        &self,
        method: MethodKind,
        spec: &OptionSpec,
        request: &RequestOptions,
    ) -> Result<()> {
        for name in request.options.keys() {
            if spec.recognizes(name) {
                continue;
            }
            match self.unknown_options {
                UnknownOptionPolicy::Ignore => {
                    debug!(method = %method, option = %name, "ignoring unrecognised option");
                }
                UnknownOptionPolicy::Reject => {
                    return Err(SwupddError::UnknownOption(name.clone()));
                }
            }
        }
        Ok(())
    }
}

fn check_positionals(spec: &OptionSpec, args: &[String]) -> Result<()> {
    match spec.positionals {
        Positionals::None if !args.is_empty() => Err(SwupddError::InvalidArguments(format!(
            "expected no positional arguments, got {}",
            args.len()
        ))),
        Positionals::One(name) if args.len() != 1 => Err(SwupddError::InvalidArguments(format!(
            "expected exactly one {name}, got {}",
            args.len()
        ))),
        _ => Ok(()),
    }
}

fn expect_string<'a>(name: &str, value: &'a OptionValue) -> Result<&'a str> {
    match value {
        OptionValue::String(s) => Ok(s),
        other => Err(SwupddError::invalid_option(
            name,
            format!("expected string, got {}", other.type_name()),
        )),
    }
}

fn expect_bool(name: &str, value: &OptionValue) -> Result<bool> {
    match value {
        OptionValue::Boolean(b) => Ok(*b),
        other => Err(SwupddError::invalid_option(
            name,
            format!("expected boolean, got {}", other.type_name()),
        )),
    }
}

fn parse_port(value: &OptionValue) -> Result<u16> {
    let raw = match value {
        OptionValue::Integer(n) => *n,
        OptionValue::String(s) => s.trim().parse::<i64>().map_err(|_| {
            SwupddError::invalid_option(PORT_OPTION, format!("'{s}' is not a number"))
        })?,
        OptionValue::Boolean(_) => {
            return Err(SwupddError::invalid_option(
                PORT_OPTION,
                "expected integer, got boolean",
            ));
        }
    };

    match u16::try_from(raw) {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(SwupddError::invalid_option(
            PORT_OPTION,
            format!("{raw} is outside 1..=65535"),
        )),
    }
}
