// src/bus/client.rs

//! Client side of the bus, used by the command-line entry points and tests.

use std::path::Path;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::UnixStream;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tracing::debug;

use crate::bus::protocol::{CallFrame, ServerFrame, encode_line};
use crate::engine::{CallAccepted, JobId, MethodCall};
use crate::errors::{Result, SwupddError};
use crate::notify::CompletionEvent;

pub struct BusClient {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
    next_id: u64,
    /// Signals that arrived while waiting for something else.
    backlog: Vec<CompletionEvent>,
}

impl BusClient {
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let stream = UnixStream::connect(path).await.map_err(|e| {
            SwupddError::Other(anyhow::anyhow!(
                "failed to connect to {}: {}",
                path.display(),
                e
            ))
        })?;
        let (read_half, writer) = stream.into_split();

        Ok(Self {
            lines: BufReader::new(read_half).lines(),
            writer,
            next_id: 1,
            backlog: Vec::new(),
        })
    }

    /// Send a call and wait for its synchronous reply.
    pub async fn call(&mut self, call: &MethodCall) -> Result<CallAccepted> {
        let id = self.next_id;
        self.next_id += 1;

        let line = encode_line(&CallFrame::new(id, call))?;
        self.writer.write_all(line.as_bytes()).await?;
        debug!(id, method = %call.method, "call sent");

        loop {
            match self.read_frame().await? {
                ServerFrame::Reply {
                    id: reply_id,
                    accepted,
                    job_id,
                    error,
                } if reply_id == id => {
                    return if accepted {
                        Ok(CallAccepted { job_id })
                    } else {
                        Err(SwupddError::Rejected(
                            error.unwrap_or_else(|| "request rejected".to_string()),
                        ))
                    };
                }
                ServerFrame::Reply { id: other, .. } => {
                    debug!(id = other, "ignoring reply for another call");
                }
                signal @ ServerFrame::Signal { .. } => {
                    if let Some(event) = into_event(signal) {
                        self.backlog.push(event);
                    }
                }
            }
        }
    }

    /// Wait for the completion event of `job_id`.
    pub async fn wait_for_job(&mut self, job_id: JobId) -> Result<CompletionEvent> {
        if let Some(pos) = self.backlog.iter().position(|e| e.job_id == Some(job_id)) {
            return Ok(self.backlog.remove(pos));
        }
        loop {
            let event = self.next_signal().await?;
            if event.job_id == Some(job_id) {
                return Ok(event);
            }
            debug!(?event.job_id, waiting_for = job_id, "skipping unrelated completion");
        }
    }

    /// Next completion signal, including ones buffered during `call`.
    pub async fn next_signal(&mut self) -> Result<CompletionEvent> {
        if !self.backlog.is_empty() {
            return Ok(self.backlog.remove(0));
        }
        loop {
            if let Some(event) = into_event(self.read_frame().await?) {
                return Ok(event);
            }
        }
    }

    async fn read_frame(&mut self) -> Result<ServerFrame> {
        let line = self.lines.next_line().await?.ok_or_else(|| {
            SwupddError::IoError(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "daemon closed the connection",
            ))
        })?;
        Ok(serde_json::from_str(&line)?)
    }
}

fn into_event(frame: ServerFrame) -> Option<CompletionEvent> {
    match frame {
        ServerFrame::Signal {
            job_id,
            method,
            status,
            output,
            ..
        } => Some(CompletionEvent {
            job_id,
            method,
            status,
            output,
        }),
        ServerFrame::Reply { .. } => None,
    }
}
