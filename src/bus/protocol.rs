// src/bus/protocol.rs

//! Line-delimited JSON frames exchanged over the bus socket.
//!
//! ```text
//! -> {"id":1,"method":"bundleAdd","options":{"url":"https://x","list":true},"args":["a"]}
//! <- {"type":"reply","id":1,"accepted":true,"job_id":4}
//! <- {"type":"signal","name":"requestCompleted","job_id":4,"method":"bundleAdd","status":0,"output":["..."]}
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::engine::{JobId, MethodCall};
use crate::errors::{Result, SwupddError};
use crate::notify::CompletionEvent;
use crate::types::{MethodKind, OptionValue, RequestOptions};

/// Name of the completion signal.
pub const REQUEST_COMPLETED: &str = "requestCompleted";

/// A method call sent by a peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallFrame {
    pub id: u64,
    pub method: String,
    #[serde(default)]
    pub options: BTreeMap<String, OptionValue>,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CallFrame {
    pub fn new(id: u64, call: &MethodCall) -> Self {
        Self {
            id,
            method: call.method.wire_name().to_string(),
            options: call.request.options.clone(),
            args: call.request.args.clone(),
        }
    }

    pub fn into_call(self) -> Result<MethodCall> {
        let method: MethodKind = self.method.parse().map_err(SwupddError::InvalidArguments)?;
        Ok(MethodCall::new(
            method,
            RequestOptions {
                options: self.options,
                args: self.args,
            },
        ))
    }
}

/// Frames sent from the daemon to a peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerFrame {
    Reply {
        id: u64,
        accepted: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        job_id: Option<JobId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Signal {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        job_id: Option<JobId>,
        method: String,
        status: i32,
        output: Vec<String>,
    },
}

impl ServerFrame {
    pub fn accepted(id: u64, job_id: Option<JobId>) -> Self {
        ServerFrame::Reply {
            id,
            accepted: true,
            job_id,
            error: None,
        }
    }

    pub fn rejected(id: u64, error: &SwupddError) -> Self {
        ServerFrame::Reply {
            id,
            accepted: false,
            job_id: None,
            error: Some(error.to_string()),
        }
    }

    pub fn completed(event: CompletionEvent) -> Self {
        ServerFrame::Signal {
            name: REQUEST_COMPLETED.to_string(),
            job_id: event.job_id,
            method: event.method,
            status: event.status,
            output: event.output,
        }
    }
}

/// Serialize a frame as one line, newline included.
pub fn encode_line<T: Serialize>(frame: &T) -> Result<String> {
    let mut line = serde_json::to_string(frame)?;
    line.push('\n');
    Ok(line)
}

/// Best-effort extraction of the call id from a frame that failed to parse,
/// so the rejection can still be correlated.
pub fn salvage_id(line: &str) -> u64 {
    serde_json::from_str::<serde_json::Value>(line)
        .ok()
        .and_then(|v| v.get("id").and_then(serde_json::Value::as_u64))
        .unwrap_or(0)
}
