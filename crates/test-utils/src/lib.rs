pub mod builders;
pub mod fake_backend;
pub mod notifier;

use std::sync::Once;

use tokio::sync::{mpsc, oneshot};
use tracing_subscriber::{EnvFilter, fmt};

use swupdd::engine::{CallAccepted, DaemonEvent, MethodCall};
use swupdd::errors::Result;

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// Send a call into a runtime the way a bus connection does and wait for the
/// synchronous reply.
pub async fn send_call(tx: &mpsc::Sender<DaemonEvent>, call: MethodCall) -> Result<CallAccepted> {
    let (reply_tx, reply_rx) = oneshot::channel();
    tx.send(DaemonEvent::Call {
        call,
        reply: reply_tx,
    })
    .await
    .map_err(|e| anyhow::anyhow!("runtime is gone: {e}"))?;

    reply_rx
        .await
        .map_err(|e| anyhow::anyhow!("runtime dropped the reply: {e}"))?
}
