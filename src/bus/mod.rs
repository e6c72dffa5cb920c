// src/bus/mod.rs

//! Bus transport: a Unix-domain socket carrying one JSON frame per line.
//!
//! - [`protocol`] defines the call, reply and signal frames.
//! - [`server`] accepts peers and feeds their calls into the runtime.
//! - [`client`] is the peer side used by the command-line entry points.

pub mod client;
pub mod protocol;
pub mod server;

pub use client::BusClient;
pub use protocol::{CallFrame, REQUEST_COMPLETED, ServerFrame};
pub use server::BusServer;
