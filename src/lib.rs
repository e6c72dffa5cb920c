// src/lib.rs

pub mod bus;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod notify;
pub mod options;
pub mod types;

use std::path::PathBuf;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::bus::{BusClient, BusServer};
use crate::cli::{CliArgs, Command, ServeArgs};
use crate::config::{ConfigFile, load_or_default};
use crate::engine::{DaemonEvent, JobController, MethodCall, Runtime};
use crate::exec::RealProcessBackend;
use crate::notify::BroadcastNotifier;
use crate::options::{OptionSpec, OptionTranslator};
use crate::types::{MethodKind, UnknownOptionPolicy};

/// High-level entry point used by `main.rs`. Returns the process exit code.
///
/// Without a subcommand (or with `serve`) this runs the daemon; every other
/// subcommand is a one-shot bus client.
pub async fn run(args: CliArgs) -> Result<i32> {
    let command = args
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command.to_call()? {
        None => {
            let serve_args = match command {
                Command::Serve(serve_args) => serve_args,
                _ => ServeArgs::default(),
            };
            serve(args.socket, &serve_args).await?;
            Ok(0)
        }
        Some(call) => run_client(args.socket, call).await,
    }
}

/// Resolve the daemon configuration: file (or defaults), environment, then
/// command-line overrides, validated as a whole.
pub fn effective_config(socket: Option<PathBuf>, serve_args: &ServeArgs) -> errors::Result<ConfigFile> {
    let mut raw = load_or_default(serve_args.config.as_deref())?;

    if let Some(socket) = socket {
        raw.daemon.socket_path = socket;
    }
    if let Some(program) = &serve_args.program {
        raw.daemon.program = program.clone();
    }
    if let Some(url) = &serve_args.default_url {
        raw.daemon.default_url = Some(url.clone());
    }
    if serve_args.strict_options {
        raw.daemon.unknown_options = UnknownOptionPolicy::Reject;
    }

    ConfigFile::try_from(raw)
}

pub fn translator_for(config: &ConfigFile) -> OptionTranslator {
    OptionTranslator::new(config.program())
        .with_default_url(config.default_url().map(str::to_string))
        .with_unknown_options(config.unknown_options())
}

/// Run the daemon until Ctrl-C.
///
/// This wires together:
/// - config loading
/// - job controller / runtime
/// - process backend
/// - bus socket server
/// - Ctrl-C handling
pub async fn serve(socket: Option<PathBuf>, serve_args: &ServeArgs) -> Result<()> {
    let config = effective_config(socket, serve_args)?;

    if serve_args.dry_run {
        print_dry_run(&config);
        return Ok(());
    }

    let (rt_tx, rt_rx) = mpsc::channel::<DaemonEvent>(64);
    let notifier = BroadcastNotifier::new(64);
    let backend = RealProcessBackend::new(rt_tx.clone());

    let server = BusServer::bind(config.socket_path(), rt_tx.clone(), notifier.clone())?;
    let socket_path = server.path().to_path_buf();
    let _server_handle = server.spawn();

    // Ctrl-C → graceful shutdown.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(DaemonEvent::ShutdownRequested).await;
        });
    }
    drop(rt_tx);

    info!(
        program = config.program(),
        socket = %socket_path.display(),
        default_url = ?config.default_url(),
        "swupdd ready"
    );

    let controller = JobController::new(translator_for(&config));
    let runtime = Runtime::new(controller, rt_rx, backend, notifier);
    let result = runtime.run().await;

    if let Err(e) = std::fs::remove_file(&socket_path) {
        warn!(path = %socket_path.display(), error = %e, "failed to remove bus socket");
    }

    result.map_err(Into::into)
}

/// Send one call to a running daemon and wait for its outcome.
///
/// Prints captured output lines and returns the job's status as exit code.
async fn run_client(socket: Option<PathBuf>, call: MethodCall) -> Result<i32> {
    let socket = match socket {
        Some(socket) => socket,
        None => ConfigFile::try_from(load_or_default(None)?)?
            .socket_path()
            .to_path_buf(),
    };

    let mut client = BusClient::connect(&socket).await?;
    let accepted = client.call(&call).await?;

    match accepted.job_id {
        Some(job_id) => {
            debug!(job_id, method = %call.method, "request accepted; waiting for completion");
            let event = client.wait_for_job(job_id).await?;
            for line in &event.output {
                println!("{line}");
            }
            Ok(event.status)
        }
        None => {
            println!("{} request accepted", call.method);
            Ok(0)
        }
    }
}

/// Dry-run output: effective config and per-method option tables.
fn print_dry_run(config: &ConfigFile) {
    println!("swupdd dry-run");
    println!("  daemon.program = {}", config.program());
    println!("  daemon.socket_path = {}", config.socket_path().display());
    match config.default_url() {
        Some(url) => println!("  daemon.default_url = {url}"),
        None => println!("  daemon.default_url = (none)"),
    }
    println!("  daemon.unknown_options = {:?}", config.unknown_options());
    println!();

    println!("methods ({}):", MethodKind::ALL.len());
    for method in MethodKind::ALL {
        let spec = OptionSpec::for_method(method);
        println!("  - {method}");
        if let Some(subcommand) = method.subcommand() {
            println!("      subcommand: {subcommand}");
        }
        if !spec.string_options.is_empty() {
            println!("      string options: {:?}", spec.string_options);
        }
        if !spec.bool_options.is_empty() {
            println!("      boolean options: {:?}", spec.bool_options);
        }
        if spec.accepts_port {
            println!("      port: true");
        }
        println!("      positionals: {:?}", spec.positionals);
    }

    debug!("dry-run complete (no socket bound)");
}
