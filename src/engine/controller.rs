// src/engine/controller.rs

//! Pure single-flight job controller.
//!
//! The controller consumes calls and child-termination reports and produces
//! an updated state plus a list of [`ControllerCommand`]s for the IO shell
//! (`engine::runtime::Runtime`) to carry out. It has no channels, no Tokio
//! types and performs no IO, so every transition can be tested directly.
//!
//! Because the shell applies one event at a time, a submission that races
//! with a termination report always sees either the fully running or the
//! fully idle state.

use tracing::{debug, info, warn};

use crate::engine::{CancelMode, JobId, JobSpec, MethodCall};
use crate::errors::{Result, SwupddError};
use crate::exec::SPAWN_FAILURE_STATUS;
use crate::notify::CompletionEvent;
use crate::options::OptionTranslator;
use crate::types::{ArgumentVector, MethodKind};

/// The job currently owning the update tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveJob {
    pub job_id: JobId,
    pub method: MethodKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobState {
    #[default]
    Idle,
    Running(ActiveJob),
}

/// Work for the IO shell, in the order it must be performed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerCommand {
    /// Start the child for a freshly accepted job.
    Launch(JobSpec),
    /// Deliver a cancellation signal to the running child.
    Signal { job_id: JobId, mode: CancelMode },
    /// Emit a completion event to bus peers.
    Notify(CompletionEvent),
}

impl ControllerCommand {
    /// Job id of a launch command, used to tell the caller which completion
    /// event belongs to its call.
    pub fn launched_job(&self) -> Option<JobId> {
        match self {
            ControllerCommand::Launch(job) => Some(job.job_id),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct JobController {
    translator: OptionTranslator,
    state: JobState,
    next_job_id: JobId,
}

impl JobController {
    pub fn new(translator: OptionTranslator) -> Self {
        Self {
            translator,
            state: JobState::Idle,
            next_job_id: 1,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == JobState::Idle
    }

    pub fn active_job(&self) -> Option<ActiveJob> {
        match self.state {
            JobState::Running(job) => Some(job),
            JobState::Idle => None,
        }
    }

    pub fn translator(&self) -> &OptionTranslator {
        &self.translator
    }

    /// Entry point for bus calls: translates the request, then submits or
    /// cancels. Errors are synchronous and leave the state untouched.
    ///
    /// An idle cancel is always `NoActiveJob`, whatever its options.
    pub fn handle_call(&mut self, call: MethodCall) -> Result<Vec<ControllerCommand>> {
        let MethodCall { method, request } = call;

        if method == MethodKind::Cancel {
            if self.is_idle() {
                warn!("cancel requested but no job is running");
                return Err(SwupddError::NoActiveJob);
            }
            let force = self.translator.cancel_force(&request)?;
            return self.cancel(CancelMode::from_force(force));
        }

        // Busy wins over malformed options, matching a plain "try later".
        self.ensure_idle(method)?;
        let argv = self.translator.translate(method, &request)?;
        self.submit(method, argv)
    }

    /// Accept a job if idle. Returns the launch command for the shell.
    pub fn submit(&mut self, method: MethodKind, argv: ArgumentVector) -> Result<Vec<ControllerCommand>> {
        self.ensure_idle(method)?;

        let job_id = self.next_job_id;
        self.next_job_id += 1;
        self.state = JobState::Running(ActiveJob { job_id, method });

        info!(job_id, method = %method, argv = %argv, "job accepted");

        Ok(vec![ControllerCommand::Launch(JobSpec {
            job_id,
            method,
            argv,
        })])
    }

    /// Route a cancellation to the running job. Does not wait for the child;
    /// its exit is reported later through [`JobController::child_terminated`].
    pub fn cancel(&mut self, mode: CancelMode) -> Result<Vec<ControllerCommand>> {
        let Some(active) = self.active_job() else {
            warn!("cancel requested but no job is running");
            return Err(SwupddError::NoActiveJob);
        };

        info!(job_id = active.job_id, method = %active.method, ?mode, "cancelling job");

        Ok(vec![
            ControllerCommand::Signal {
                job_id: active.job_id,
                mode,
            },
            ControllerCommand::Notify(CompletionEvent::cancel_echo()),
        ])
    }

    /// Release the single-flight slot and produce the job's completion event.
    ///
    /// Reports for a job that is not the active one are dropped, so a stale
    /// report can never free a newer job's slot.
    pub fn child_terminated(
        &mut self,
        job_id: JobId,
        status: i32,
        output: Vec<String>,
    ) -> Vec<ControllerCommand> {
        match self.state {
            JobState::Running(active) if active.job_id == job_id => {
                self.state = JobState::Idle;
                if status == SPAWN_FAILURE_STATUS {
                    warn!(job_id, method = %active.method, "job failed to start");
                } else {
                    info!(job_id, method = %active.method, status, "job finished");
                }
                vec![ControllerCommand::Notify(CompletionEvent::for_job(
                    job_id,
                    active.method,
                    status,
                    output,
                ))]
            }
            JobState::Running(active) => {
                warn!(
                    job_id,
                    active_job_id = active.job_id,
                    "termination report for a job that is not active; ignoring"
                );
                Vec::new()
            }
            JobState::Idle => {
                debug!(job_id, "termination report while idle; ignoring");
                Vec::new()
            }
        }
    }

    fn ensure_idle(&self, method: MethodKind) -> Result<()> {
        if let Some(active) = self.active_job() {
            warn!(
                method = %method,
                active_job_id = active.job_id,
                active_method = %active.method,
                "busy with ongoing request"
            );
            return Err(SwupddError::Busy);
        }
        Ok(())
    }
}
