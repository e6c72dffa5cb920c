// src/engine/runtime.rs

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::exec::{ProcessBackend, SPAWN_FAILURE_STATUS};
use crate::notify::CompletionNotifier;

use super::controller::{ControllerCommand, JobController};
use super::{CallAccepted, DaemonEvent, JobSpec};

/// Drives the job controller in response to `DaemonEvent`s, delegating
/// process handling to a `ProcessBackend` and outward signals to a
/// `CompletionNotifier`.
///
/// Events are handled one at a time, which is what makes the controller's
/// state transitions atomic with respect to each other.
pub struct Runtime<B: ProcessBackend, N: CompletionNotifier> {
    controller: JobController,
    event_rx: mpsc::Receiver<DaemonEvent>,
    backend: B,
    notifier: N,
}

impl<B: ProcessBackend, N: CompletionNotifier> fmt::Debug for Runtime<B, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("controller", &self.controller)
            .finish_non_exhaustive()
    }
}

impl<B: ProcessBackend, N: CompletionNotifier> Runtime<B, N> {
    pub fn new(
        controller: JobController,
        event_rx: mpsc::Receiver<DaemonEvent>,
        backend: B,
        notifier: N,
    ) -> Self {
        Self {
            controller,
            event_rx,
            backend,
            notifier,
        }
    }

    /// Main event loop. Returns when shutdown is requested or every event
    /// sender is gone, after the backend has stopped any running child.
    pub async fn run(mut self) -> Result<()> {
        info!("swupdd runtime started");

        while let Some(event) = self.event_rx.recv().await {
            debug!(?event, "runtime received event");

            match event {
                DaemonEvent::Call { call, reply } => {
                    let method = call.method;
                    // Reply before acting, so the caller always learns about
                    // acceptance ahead of the job's outcome.
                    let (answer, commands) = match self.controller.handle_call(call) {
                        Ok(commands) => {
                            let job_id = commands.iter().find_map(ControllerCommand::launched_job);
                            (Ok(CallAccepted { job_id }), commands)
                        }
                        Err(err) => {
                            debug!(method = %method, error = %err, "call rejected");
                            (Err(err), Vec::new())
                        }
                    };
                    if reply.send(answer).is_err() {
                        debug!(method = %method, "caller went away before the reply");
                    }
                    self.execute_commands(commands).await?;
                }
                DaemonEvent::ChildTerminated {
                    job_id,
                    status,
                    output,
                } => {
                    let commands = self.controller.child_terminated(job_id, status, output);
                    self.execute_commands(commands).await?;
                }
                DaemonEvent::ShutdownRequested => {
                    info!("shutdown requested; stopping runtime");
                    break;
                }
            }
        }

        if let Some(active) = self.controller.active_job() {
            warn!(
                job_id = active.job_id,
                method = %active.method,
                "shutting down with a job still running; killing it"
            );
        }
        self.backend.shutdown().await?;

        info!("runtime exiting");
        Ok(())
    }

    async fn execute_commands(&mut self, commands: Vec<ControllerCommand>) -> Result<()> {
        for command in commands {
            match command {
                ControllerCommand::Launch(job) => self.launch(job).await?,
                ControllerCommand::Signal { job_id, mode } => {
                    self.backend.signal(job_id, mode).await?;
                }
                ControllerCommand::Notify(event) => self.notifier.notify(event)?,
            }
        }
        Ok(())
    }

    /// A backend that cannot even schedule the job is treated like a child
    /// that failed to spawn, so the slot is released and callers still get
    /// their completion event.
    async fn launch(&mut self, job: JobSpec) -> Result<()> {
        let job_id = job.job_id;
        if let Err(err) = self.backend.launch(job).await {
            warn!(job_id, error = %err, "backend failed to launch job");
            let commands =
                self.controller
                    .child_terminated(job_id, SPAWN_FAILURE_STATUS, vec![err.to_string()]);
            for command in commands {
                if let ControllerCommand::Notify(event) = command {
                    self.notifier.notify(event)?;
                }
            }
        }
        Ok(())
    }
}
