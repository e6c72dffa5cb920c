// src/engine/mod.rs

//! Job execution engine for swupdd.
//!
//! This module ties together:
//! - the single-flight job controller (at most one update-tool child at a time)
//! - the main runtime event loop that reacts to:
//!   - method calls arriving over the bus
//!   - child termination reported by the process supervisor
//!   - shutdown signals
//!
//! The pure state machine lives in [`controller`]; the async/IO shell is
//! implemented in [`runtime`].

use tokio::sync::oneshot;

use crate::errors::Result;
use crate::types::{ArgumentVector, MethodKind, RequestOptions};

/// Monotonic identifier of an accepted job.
pub type JobId = u64;

/// How a cancel request should stop the running child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelMode {
    /// Interrupt (SIGINT), letting the tool clean up.
    Graceful,
    /// Unconditional kill (SIGKILL).
    Forced,
}

impl CancelMode {
    pub fn from_force(force: bool) -> Self {
        if force {
            CancelMode::Forced
        } else {
            CancelMode::Graceful
        }
    }
}

/// A decoded call from a bus peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodCall {
    pub method: MethodKind,
    pub request: RequestOptions,
}

impl MethodCall {
    pub fn new(method: MethodKind, request: RequestOptions) -> Self {
        Self { method, request }
    }
}

/// Everything the process supervisor needs to run one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub job_id: JobId,
    pub method: MethodKind,
    pub argv: ArgumentVector,
}

/// Synchronous answer to an accepted call. Carries the job id when the call
/// started a job, so callers can match the later completion event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallAccepted {
    pub job_id: Option<JobId>,
}

/// Events flowing into the runtime from bus connections, supervisors, etc.
#[derive(Debug)]
pub enum DaemonEvent {
    /// A bus peer called a method. The reply only says whether the call was
    /// accepted; the outcome of a job arrives later as a completion event.
    Call {
        call: MethodCall,
        reply: oneshot::Sender<Result<CallAccepted>>,
    },
    /// The child of `job_id` exited (or could not be started).
    ChildTerminated {
        job_id: JobId,
        status: i32,
        output: Vec<String>,
    },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

pub mod controller;
pub mod runtime;

pub use controller::{ActiveJob, ControllerCommand, JobController, JobState};
pub use runtime::Runtime;
