// src/exec/backend.rs

//! Pluggable process backend abstraction.
//!
//! The runtime talks to a `ProcessBackend` instead of spawning processes
//! itself. This makes it easy to swap in a fake backend in tests while
//! keeping the production implementation in [`supervisor`].
//!
//! [`supervisor`]: crate::exec::supervisor

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::engine::{CancelMode, DaemonEvent, JobId, JobSpec};
use crate::errors::Result;

use super::supervisor::supervise;

/// Trait abstracting how jobs are run.
///
/// Implementations must eventually send exactly one
/// `DaemonEvent::ChildTerminated` for every job passed to `launch`.
pub trait ProcessBackend: Send {
    /// Start the job. Must not wait for the child to finish.
    fn launch(&mut self, job: JobSpec) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Ask the job's child to stop. Must not wait for it to exit.
    fn signal(
        &mut self,
        job_id: JobId,
        mode: CancelMode,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Stop anything still running before the daemon exits. Resolves once
    /// the child is gone.
    fn shutdown(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async { Ok(()) })
    }
}

/// How long shutdown waits for a killed child to be reaped.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Handle for the child currently supervised by the real backend.
struct ActiveChild {
    job_id: JobId,
    signals: mpsc::UnboundedSender<CancelMode>,
    handle: tokio::task::JoinHandle<()>,
}

/// Real backend used in production: one Tokio task per job running
/// [`supervise`].
pub struct RealProcessBackend {
    runtime_tx: mpsc::Sender<DaemonEvent>,
    active: Option<ActiveChild>,
}

impl RealProcessBackend {
    pub fn new(runtime_tx: mpsc::Sender<DaemonEvent>) -> Self {
        Self {
            runtime_tx,
            active: None,
        }
    }
}

impl ProcessBackend for RealProcessBackend {
    fn launch(&mut self, job: JobSpec) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            if let Some(previous) = &self.active {
                if !previous.handle.is_finished() {
                    // The controller only launches once the previous report
                    // arrived; the supervisor task is just winding down.
                    debug!(
                        job_id = job.job_id,
                        previous_job_id = previous.job_id,
                        "previous supervisor task still finishing"
                    );
                }
            }

            let (signals_tx, signals_rx) = mpsc::unbounded_channel();
            let job_id = job.job_id;
            let runtime_tx = self.runtime_tx.clone();

            let handle = tokio::spawn(async move {
                supervise(job, signals_rx, runtime_tx).await;
                debug!(job_id, "supervisor future finished");
            });

            self.active = Some(ActiveChild {
                job_id,
                signals: signals_tx,
                handle,
            });
            Ok(())
        })
    }

    fn signal(
        &mut self,
        job_id: JobId,
        mode: CancelMode,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            match &self.active {
                Some(active) if active.job_id == job_id => {
                    if active.signals.send(mode).is_err() {
                        debug!(job_id, "child already exited while cancelling");
                    } else {
                        info!(job_id, ?mode, "cancellation forwarded to supervisor");
                    }
                }
                _ => {
                    debug!(job_id, "no supervised child for job; nothing to signal");
                }
            }
            Ok(())
        })
    }

    fn shutdown(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let Some(active) = self.active.take() else {
                return Ok(());
            };
            if active.handle.is_finished() {
                return Ok(());
            }

            info!(job_id = active.job_id, "killing update tool for shutdown");
            if active.signals.send(CancelMode::Forced).is_err() {
                debug!(job_id = active.job_id, "child already exited while shutting down");
            }

            let mut handle = active.handle;
            if tokio::time::timeout(SHUTDOWN_GRACE, &mut handle).await.is_err() {
                warn!(
                    job_id = active.job_id,
                    "supervisor did not finish in time; aborting it"
                );
                handle.abort();
            }
            Ok(())
        })
    }
}
