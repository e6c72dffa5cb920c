// src/notify.rs

//! Completion notifications.
//!
//! Every job that reached the running state produces exactly one
//! [`CompletionEvent`]. The runtime hands it to a [`CompletionNotifier`],
//! which in production fans it out to every bus peer through a
//! `tokio::sync::broadcast` channel.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::engine::JobId;
use crate::errors::Result;
use crate::types::MethodKind;

/// Outcome of one job, as seen by callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionEvent {
    /// Job this event completes; `None` for the cancel echo.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    /// Wire name of the method, e.g. `bundleAdd`.
    pub method: String,
    /// Exit status of the tool, or one of the reserved sentinels.
    pub status: i32,
    /// Captured stdout/stderr lines, without trailing newlines.
    pub output: Vec<String>,
}

impl CompletionEvent {
    pub fn new(method: MethodKind, status: i32, output: Vec<String>) -> Self {
        Self {
            job_id: None,
            method: method.wire_name().to_string(),
            status,
            output,
        }
    }

    pub fn for_job(job_id: JobId, method: MethodKind, status: i32, output: Vec<String>) -> Self {
        Self {
            job_id: Some(job_id),
            ..Self::new(method, status, output)
        }
    }

    /// Echo emitted when a cancel request reached a running job.
    pub fn cancel_echo() -> Self {
        Self::new(MethodKind::Cancel, 0, Vec::new())
    }

    pub fn succeeded(&self) -> bool {
        self.status == 0
    }
}

/// Outward channel for completion events.
pub trait CompletionNotifier: Send {
    fn notify(&mut self, event: CompletionEvent) -> Result<()>;
}

/// Notifier backed by a broadcast channel; each bus connection subscribes.
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<CompletionEvent>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CompletionEvent> {
        self.tx.subscribe()
    }
}

impl CompletionNotifier for BroadcastNotifier {
    fn notify(&mut self, event: CompletionEvent) -> Result<()> {
        info!(
            job_id = ?event.job_id,
            method = %event.method,
            status = event.status,
            lines = event.output.len(),
            "emitting requestCompleted"
        );
        // No subscribers is not an error: nobody is listening right now.
        if self.tx.send(event).is_err() {
            debug!("requestCompleted dropped; no bus peers connected");
        }
        Ok(())
    }
}
