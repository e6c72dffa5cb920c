// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for actually running the update tool, using
//! `tokio::process::Command`, and reporting back to the runtime via
//! `DaemonEvent::ChildTerminated`.
//!
//! - [`supervisor`] runs one child: merged output capture, cancellation
//!   signals, exit status mapping.
//! - [`backend`] provides the `ProcessBackend` trait and the concrete
//!   `RealProcessBackend` used in production, which tests can replace with a
//!   fake implementation.

pub mod backend;
pub mod supervisor;

pub use backend::{ProcessBackend, RealProcessBackend};
pub use supervisor::supervise;

/// Status reported when the tool could not be started (or waited on).
pub const SPAWN_FAILURE_STATUS: i32 = -1;

/// Status reported when the child was terminated by a signal.
pub const INTERRUPTED_STATUS: i32 = 130;
