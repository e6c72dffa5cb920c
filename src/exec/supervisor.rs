// src/exec/supervisor.rs

//! Supervision of a single update-tool child process.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};
use nix::fcntl::OFlag;
use nix::sys::signal::{Signal, kill};
use nix::unistd::{Pid, pipe2};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::net::unix::pipe;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, error, info, warn};

use crate::engine::{CancelMode, DaemonEvent, JobId, JobSpec};

use super::{INTERRUPTED_STATUS, SPAWN_FAILURE_STATUS};

/// How long output is still collected after the tool has exited.
pub const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Run one job to completion and report it to the runtime.
///
/// Exactly one `ChildTerminated` is sent, after the exit status is known and
/// all output has been drained. Failures to start or wait on the child are
/// reported with [`SPAWN_FAILURE_STATUS`] and a single diagnostic line.
pub async fn supervise(
    job: JobSpec,
    signals: mpsc::UnboundedReceiver<CancelMode>,
    runtime_tx: mpsc::Sender<DaemonEvent>,
) {
    let job_id = job.job_id;
    let (status, output) = match run_child(&job, signals).await {
        Ok(outcome) => outcome,
        Err(err) => {
            error!(job_id, method = %job.method, error = %format!("{err:#}"), "job execution error");
            (SPAWN_FAILURE_STATUS, vec![format!("{err:#}")])
        }
    };

    if runtime_tx
        .send(DaemonEvent::ChildTerminated {
            job_id,
            status,
            output,
        })
        .await
        .is_err()
    {
        warn!(job_id, "runtime is gone; dropping termination report");
    }
}

async fn run_child(
    job: &JobSpec,
    mut signals: mpsc::UnboundedReceiver<CancelMode>,
) -> Result<(i32, Vec<String>)> {
    let job_id = job.job_id;
    let program = job.argv.program().context("empty argument vector")?;

    // stdout and stderr share one pipe, so lines keep the order they were
    // written in.
    let (read_end, write_end) = pipe2(OFlag::O_CLOEXEC).context("creating output pipe")?;
    let output = pipe::Receiver::from_owned_fd(read_end).context("registering output pipe")?;

    let mut child = {
        let mut cmd = Command::new(program);
        cmd.args(job.argv.args())
            .stdin(Stdio::null())
            .stdout(Stdio::from(
                write_end.try_clone().context("duplicating output pipe")?,
            ))
            .stderr(Stdio::from(write_end))
            .kill_on_drop(true);

        cmd.spawn()
            .with_context(|| format!("failed to launch '{program}'"))?
        // `cmd` drops here, closing our copies of the write end.
    };

    info!(job_id, pid = ?child.id(), argv = %job.argv, "update tool started");

    let (line_tx, mut line_rx) = mpsc::unbounded_channel::<String>();
    let reader = spawn_line_reader(output, line_tx, job_id);

    let mut signals_open = true;
    let status = loop {
        tokio::select! {
            status = child.wait() => {
                break status.with_context(|| format!("waiting for '{program}'"))?;
            }
            mode = signals.recv(), if signals_open => match mode {
                Some(mode) => deliver_signal(&mut child, mode, job_id),
                None => signals_open = false,
            },
        }
    };

    let output = drain_output(&mut line_rx, reader, job_id).await;

    let code = exit_status_code(status);
    info!(
        job_id,
        exit_code = code,
        success = status.success(),
        lines = output.len(),
        "update tool exited"
    );

    Ok((code, output))
}

/// Collect the remaining output once the tool has exited.
///
/// A background process started by the tool can keep the pipe open
/// indefinitely; capture stops after [`OUTPUT_DRAIN_TIMEOUT`].
async fn drain_output(
    lines: &mut mpsc::UnboundedReceiver<String>,
    reader: JoinHandle<()>,
    job_id: JobId,
) -> Vec<String> {
    let deadline = Instant::now() + OUTPUT_DRAIN_TIMEOUT;
    let mut output = Vec::new();
    loop {
        match timeout_at(deadline, lines.recv()).await {
            Ok(Some(line)) => output.push(line),
            Ok(None) => break,
            Err(_) => {
                warn!(
                    job_id,
                    "output pipe still open after exit; keeping what was captured"
                );
                reader.abort();
                break;
            }
        }
    }
    output
}

/// Map an exit status onto the status reported to callers. Signal-terminated
/// children report [`INTERRUPTED_STATUS`].
pub fn exit_status_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(INTERRUPTED_STATUS)
}

fn spawn_line_reader<R>(
    stream: R,
    tx: mpsc::UnboundedSender<String>,
    job_id: JobId,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = trim_line(&buf);
                    debug!(job_id, "{}", line);
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(job_id, error = %e, "failed reading child output");
                    break;
                }
            }
        }
    })
}

fn trim_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

fn deliver_signal(child: &mut Child, mode: CancelMode, job_id: JobId) {
    let result = match mode {
        CancelMode::Graceful => interrupt(child),
        CancelMode::Forced => child.start_kill(),
    };
    match result {
        Ok(()) => info!(job_id, ?mode, "signal delivered to update tool"),
        Err(e) => warn!(job_id, ?mode, error = %e, "failed to signal update tool"),
    }
}

fn interrupt(child: &mut Child) -> std::io::Result<()> {
    let Some(pid) = child.id() else {
        // Already reaped; the wait branch will report it.
        return Ok(());
    };
    kill(Pid::from_raw(pid as i32), Signal::SIGINT).map_err(std::io::Error::from)
}
