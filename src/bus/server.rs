// src/bus/server.rs

//! Unix-socket server exposing the daemon's methods to bus peers.
//!
//! Each connection gets:
//! - a reader loop turning call frames into `DaemonEvent::Call`s
//! - a forwarder relaying completion events from the broadcast channel
//! - a single writer task, so replies and signals never interleave mid-line

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::bus::protocol::{CallFrame, ServerFrame, encode_line, salvage_id};
use crate::engine::DaemonEvent;
use crate::errors::{Result, SwupddError};
use crate::notify::{BroadcastNotifier, CompletionEvent};

pub struct BusServer {
    listener: UnixListener,
    path: PathBuf,
    events: mpsc::Sender<DaemonEvent>,
    notifier: BroadcastNotifier,
}

impl BusServer {
    /// Bind the socket, replacing a stale socket file left by a previous run.
    pub fn bind(
        path: impl AsRef<Path>,
        events: mpsc::Sender<DaemonEvent>,
        notifier: BroadcastNotifier,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if path.exists() {
            debug!(path = %path.display(), "removing stale socket");
            std::fs::remove_file(&path)?;
        }
        let listener = UnixListener::bind(&path)?;
        info!(path = %path.display(), "bus socket bound");

        Ok(Self {
            listener,
            path,
            events,
            notifier,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Spawn the accept loop.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move { self.accept_loop().await })
    }

    async fn accept_loop(self) {
        let mut failures = 0usize;
        loop {
            match self.listener.accept().await {
                Ok((stream, _addr)) => {
                    failures = 0;
                    let events = self.events.clone();
                    let signals = self.notifier.subscribe();
                    tokio::spawn(async move {
                        serve_connection(stream, events, signals).await;
                    });
                }
                Err(e) => {
                    let backoff = accept_backoff(failures);
                    failures = failures.saturating_add(1);
                    warn!(
                        error = %e,
                        failures,
                        backoff_ms = backoff.as_millis() as u64,
                        "failed to accept bus connection; backing off"
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

/// Pause after consecutive accept failures (e.g. out of file descriptors).
const ACCEPT_BACKOFF: [Duration; 4] = [
    Duration::from_millis(50),
    Duration::from_millis(200),
    Duration::from_secs(1),
    Duration::from_secs(5),
];

/// Back-off before the next accept after `failures` failures in a row.
pub fn accept_backoff(failures: usize) -> Duration {
    ACCEPT_BACKOFF[failures.min(ACCEPT_BACKOFF.len() - 1)]
}

async fn serve_connection(
    stream: UnixStream,
    events: mpsc::Sender<DaemonEvent>,
    signals: broadcast::Receiver<CompletionEvent>,
) {
    debug!("bus peer connected");
    let (read_half, write_half) = stream.into_split();
    let (out_tx, out_rx) = mpsc::channel::<ServerFrame>(64);

    let writer = tokio::spawn(write_frames(write_half, out_rx));
    let forwarder = tokio::spawn(forward_signals(signals, out_tx.clone()));

    let mut lines = BufReader::new(read_half).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "failed reading from bus peer");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let reply = handle_line(&line, &events).await;
        if out_tx.send(reply).await.is_err() {
            break;
        }
    }

    debug!("bus peer disconnected");
    forwarder.abort();
    drop(out_tx);
    let _ = writer.await;
}

async fn handle_line(line: &str, events: &mpsc::Sender<DaemonEvent>) -> ServerFrame {
    let frame: CallFrame = match serde_json::from_str(line) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, "malformed call frame");
            return ServerFrame::rejected(salvage_id(line), &SwupddError::from(e));
        }
    };
    let id = frame.id;

    let call = match frame.into_call() {
        Ok(call) => call,
        Err(e) => return ServerFrame::rejected(id, &e),
    };

    let (reply_tx, reply_rx) = oneshot::channel();
    if events
        .send(DaemonEvent::Call {
            call,
            reply: reply_tx,
        })
        .await
        .is_err()
    {
        let err = SwupddError::Other(anyhow::anyhow!("daemon is shutting down"));
        return ServerFrame::rejected(id, &err);
    }

    match reply_rx.await {
        Ok(Ok(accepted)) => ServerFrame::accepted(id, accepted.job_id),
        Ok(Err(e)) => ServerFrame::rejected(id, &e),
        Err(_) => {
            let err = SwupddError::Other(anyhow::anyhow!("daemon dropped the call"));
            ServerFrame::rejected(id, &err)
        }
    }
}

async fn forward_signals(
    mut signals: broadcast::Receiver<CompletionEvent>,
    out_tx: mpsc::Sender<ServerFrame>,
) {
    loop {
        match signals.recv().await {
            Ok(event) => {
                if out_tx.send(ServerFrame::completed(event)).await.is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "bus peer lagging; dropped completion signals");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn write_frames(mut writer: OwnedWriteHalf, mut out_rx: mpsc::Receiver<ServerFrame>) {
    while let Some(frame) = out_rx.recv().await {
        let line = match encode_line(&frame) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "failed to encode frame");
                continue;
            }
        };
        if let Err(e) = writer.write_all(line.as_bytes()).await {
            debug!(error = %e, "bus peer stopped reading");
            break;
        }
    }
}
