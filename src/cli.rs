// src/cli.rs

//! CLI argument parsing using `clap`.
//!
//! The same binary runs the daemon (`serve`, the default) and acts as a
//! client for every bus method.

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::engine::MethodCall;
use crate::types::{MethodKind, RequestOptions};

/// Command-line arguments for `swupdd`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "swupdd",
    version,
    about = "Run software update requests one at a time on behalf of bus clients.",
    long_about = None
)]
pub struct CliArgs {
    /// Bus socket path. Overrides `[daemon].socket_path`.
    #[arg(long, global = true, value_name = "PATH")]
    pub socket: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SWUPDD_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the daemon (default).
    Serve(ServeArgs),
    /// Check whether an update is available for a bundle.
    CheckUpdate {
        #[command(flatten)]
        url: UrlArgs,
        bundle: String,
    },
    /// Update the system.
    Update(UpdateArgs),
    /// Verify (and optionally fix) the installed system.
    Verify(VerifyArgs),
    /// Install bundles.
    BundleAdd(BundleAddArgs),
    /// Remove a bundle.
    BundleRemove {
        #[command(flatten)]
        url: UrlArgs,
        bundle: String,
    },
    /// Dump the hash of a file as the update tool computes it.
    HashDump {
        #[command(flatten)]
        url: UrlArgs,
        filename: String,
    },
    /// Cancel the running request.
    Cancel {
        /// Kill the running tool instead of interrupting it.
        #[arg(short = 'x', long)]
        force: bool,
    },
}

#[derive(Debug, Clone, Default, Args)]
pub struct ServeArgs {
    /// Path to the config file (TOML). Default: `/etc/swupdd.toml` if present.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Update tool to launch. Overrides `[daemon].program`.
    #[arg(long, value_name = "PROGRAM")]
    pub program: Option<String>,

    /// Base URL used when a caller gives none. Overrides `[daemon].default_url`.
    #[arg(long, value_name = "URL")]
    pub default_url: Option<String>,

    /// Reject unknown option names instead of ignoring them.
    #[arg(long)]
    pub strict_options: bool,

    /// Print the effective configuration and option tables, then exit.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default, Args)]
pub struct UrlArgs {
    /// RFC-3986 encoded url for version string and content file downloads
    #[arg(short = 'u', long)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct SourceArgs {
    /// RFC-3986 encoded url for version string and content file downloads
    #[arg(short = 'u', long)]
    pub url: Option<String>,
    /// RFC-3986 encoded url for content file downloads
    #[arg(short = 'c', long)]
    pub contenturl: Option<String>,
    /// RFC-3986 encoded url for version string download
    #[arg(short = 'v', long)]
    pub versionurl: Option<String>,
    /// Port number to connect to at the url
    #[arg(short = 'P', long)]
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct StateArgs {
    /// Use PATH as the root to operate on (eg: a chroot or btrfs subvol)
    #[arg(short = 'p', long)]
    pub path: Option<String>,
    /// The format suffix for version file downloads (staging, 1, 2, ...)
    #[arg(short = 'F', long)]
    pub format: Option<String>,
    /// Alternate state directory
    #[arg(short = 'S', long)]
    pub statedir: Option<String>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct UpdateArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    #[command(flatten)]
    pub state: StateArgs,
    /// Download all content, but do not actually install the update
    #[arg(short = 'd', long)]
    pub download: bool,
    /// Show current OS version and latest version available on server
    #[arg(short = 's', long)]
    pub status: bool,
    /// Attempt to proceed even if non-critical errors found
    #[arg(short = 'x', long)]
    pub force: bool,
}

#[derive(Debug, Clone, Default, Args)]
pub struct VerifyArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Verify against manifest version M
    #[arg(short = 'm', long)]
    pub manifest: Option<String>,
    /// Correct any issues found
    #[arg(short = 'f', long)]
    pub fix: bool,
    /// Install all files into the path
    #[arg(short = 'i', long)]
    pub install: bool,
    /// Don't compare hashes, only fix missing files
    #[arg(short = 'q', long)]
    pub quick: bool,
    /// Attempt to proceed even if non-critical errors found
    #[arg(short = 'x', long)]
    pub force: bool,
}

#[derive(Debug, Clone, Default, Args)]
pub struct BundleAddArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    #[command(flatten)]
    pub state: StateArgs,
    /// List all available bundles for the current version
    #[arg(short = 'l', long)]
    pub list: bool,
    /// Attempt to proceed even if non-critical errors found
    #[arg(short = 'x', long)]
    pub force: bool,
    /// Bundles to install.
    pub bundles: Vec<String>,
}

impl Command {
    /// Build the bus call for a client subcommand; `None` for `serve`.
    pub fn to_call(&self) -> Result<Option<MethodCall>> {
        let call = match self {
            Command::Serve(_) => return Ok(None),
            Command::CheckUpdate { url, bundle } => MethodCall::new(
                MethodKind::CheckUpdate,
                url.apply(RequestOptions::new()).with_args([bundle.clone()]),
            ),
            Command::Update(args) => {
                let request = args.state.apply(args.source.apply(RequestOptions::new()));
                let request = flag(request, "download", args.download);
                let request = flag(request, "status", args.status);
                MethodCall::new(MethodKind::Update, flag(request, "force", args.force))
            }
            Command::Verify(args) => {
                let mut request = args.source.apply(RequestOptions::new());
                if let Some(manifest) = &args.manifest {
                    request = request.with_option("manifest", manifest.as_str());
                }
                let request = flag(request, "fix", args.fix);
                let request = flag(request, "install", args.install);
                let request = flag(request, "quick", args.quick);
                MethodCall::new(MethodKind::Verify, flag(request, "force", args.force))
            }
            Command::BundleAdd(args) => {
                if !args.list && args.bundles.is_empty() {
                    bail!("missing bundle(s) to be installed");
                }
                let request = args.state.apply(args.source.apply(RequestOptions::new()));
                let request = flag(request, "list", args.list);
                let request = flag(request, "force", args.force);
                MethodCall::new(
                    MethodKind::BundleAdd,
                    request.with_args(args.bundles.iter().cloned()),
                )
            }
            Command::BundleRemove { url, bundle } => MethodCall::new(
                MethodKind::BundleRemove,
                url.apply(RequestOptions::new()).with_args([bundle.clone()]),
            ),
            Command::HashDump { url, filename } => MethodCall::new(
                MethodKind::HashDump,
                url.apply(RequestOptions::new()).with_args([filename.clone()]),
            ),
            Command::Cancel { force } => MethodCall::new(
                MethodKind::Cancel,
                RequestOptions::new().with_option("force", *force),
            ),
        };
        Ok(Some(call))
    }
}

impl UrlArgs {
    fn apply(&self, request: RequestOptions) -> RequestOptions {
        string_opt(request, "url", &self.url)
    }
}

impl SourceArgs {
    fn apply(&self, request: RequestOptions) -> RequestOptions {
        let request = string_opt(request, "url", &self.url);
        let request = string_opt(request, "contenturl", &self.contenturl);
        let request = string_opt(request, "versionurl", &self.versionurl);
        match self.port {
            Some(port) => request.with_option("port", i64::from(port)),
            None => request,
        }
    }
}

impl StateArgs {
    fn apply(&self, request: RequestOptions) -> RequestOptions {
        let request = string_opt(request, "path", &self.path);
        let request = string_opt(request, "format", &self.format);
        string_opt(request, "statedir", &self.statedir)
    }
}

fn string_opt(request: RequestOptions, name: &str, value: &Option<String>) -> RequestOptions {
    match value {
        Some(v) => request.with_option(name, v.as_str()),
        None => request,
    }
}

/// Only set flags are sent; absent means false to the daemon anyway.
fn flag(request: RequestOptions, name: &str, set: bool) -> RequestOptions {
    if set {
        request.with_option(name, true)
    } else {
        request
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
