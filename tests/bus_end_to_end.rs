// tests/bus_end_to_end.rs
#![cfg(unix)]

use std::error::Error;
use std::path::PathBuf;

use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use swupdd::bus::{BusClient, BusServer, REQUEST_COMPLETED, ServerFrame};
use swupdd::engine::{DaemonEvent, JobController, Runtime};
use swupdd::errors::SwupddError;
use swupdd::exec::RealProcessBackend;
use swupdd::notify::BroadcastNotifier;
use swupdd::options::OptionTranslator;
use swupdd::types::MethodKind;
use swupdd_test_utils::builders::CallBuilder;
use swupdd_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

/// A daemon whose "update tool" is `echo`, so each job prints its own
/// argument vector.
struct Daemon {
    socket: PathBuf,
    tx: mpsc::Sender<DaemonEvent>,
    runtime: JoinHandle<swupdd::errors::Result<()>>,
    _dir: TempDir,
}

fn start_daemon(translator: OptionTranslator) -> Daemon {
    init_tracing();

    let dir = tempfile::tempdir().expect("tempdir");
    let socket = dir.path().join("swupdd.sock");

    let (tx, rx) = mpsc::channel(64);
    let notifier = BroadcastNotifier::new(64);
    let backend = RealProcessBackend::new(tx.clone());

    let server = BusServer::bind(&socket, tx.clone(), notifier.clone()).expect("bind socket");
    server.spawn();

    let controller = JobController::new(translator);
    let runtime = tokio::spawn(Runtime::new(controller, rx, backend, notifier).run());

    Daemon {
        socket,
        tx,
        runtime,
        _dir: dir,
    }
}

impl Daemon {
    async fn stop(self) {
        self.tx
            .send(DaemonEvent::ShutdownRequested)
            .await
            .expect("runtime gone");
        with_timeout(self.runtime)
            .await
            .expect("runtime panicked")
            .expect("runtime failed");
    }
}

#[tokio::test]
async fn call_reply_and_completion_signal() -> TestResult {
    let daemon = start_daemon(OptionTranslator::new("echo"));
    let mut client = BusClient::connect(&daemon.socket).await?;

    let call = CallBuilder::new(MethodKind::BundleAdd)
        .string("url", "https://x")
        .flag("list", true)
        .arg("a")
        .arg("b")
        .build();
    let accepted = with_timeout(client.call(&call)).await?;
    let job_id = accepted.job_id.expect("job id in reply");

    let event = with_timeout(client.wait_for_job(job_id)).await?;
    assert_eq!(event.method, "bundleAdd");
    assert_eq!(event.status, 0);
    assert_eq!(event.output, vec!["bundle-add --url=https://x --list a b"]);

    daemon.stop().await;
    Ok(())
}

#[tokio::test]
async fn default_url_reaches_the_update_tool() -> TestResult {
    let translator =
        OptionTranslator::new("echo").with_default_url(Some("https://cdn.example".to_string()));
    let daemon = start_daemon(translator);
    let mut client = BusClient::connect(&daemon.socket).await?;

    let call = CallBuilder::new(MethodKind::CheckUpdate)
        .arg("os-core")
        .build();
    let accepted = with_timeout(client.call(&call)).await?;
    let event = with_timeout(client.wait_for_job(accepted.job_id.unwrap())).await?;

    assert_eq!(
        event.output,
        vec!["check-update --url=https://cdn.example os-core"]
    );

    daemon.stop().await;
    Ok(())
}

#[tokio::test]
async fn rejected_calls_carry_the_reason() -> TestResult {
    let daemon = start_daemon(OptionTranslator::new("echo"));
    let mut client = BusClient::connect(&daemon.socket).await?;

    let missing_bundle = CallBuilder::new(MethodKind::BundleRemove).build();
    match with_timeout(client.call(&missing_bundle)).await {
        Err(SwupddError::Rejected(reason)) => {
            assert!(reason.contains("invalid arguments"), "reason: {reason}")
        }
        other => panic!("expected rejection, got {other:?}"),
    }

    let idle_cancel = CallBuilder::new(MethodKind::Cancel).build();
    match with_timeout(client.call(&idle_cancel)).await {
        Err(SwupddError::Rejected(reason)) => {
            assert!(reason.contains("no active request"), "reason: {reason}")
        }
        other => panic!("expected rejection, got {other:?}"),
    }

    daemon.stop().await;
    Ok(())
}

#[tokio::test]
async fn every_peer_receives_completion_signals() -> TestResult {
    let daemon = start_daemon(OptionTranslator::new("echo"));
    let mut caller = BusClient::connect(&daemon.socket).await?;
    let mut observer = BusClient::connect(&daemon.socket).await?;

    // A round trip guarantees the observer's connection is being served.
    let probe = CallBuilder::new(MethodKind::Cancel).build();
    assert!(with_timeout(observer.call(&probe)).await.is_err());

    let call = CallBuilder::new(MethodKind::HashDump)
        .arg("/usr/bin/swupd")
        .build();
    let accepted = with_timeout(caller.call(&call)).await?;
    let job_id = accepted.job_id.unwrap();

    let seen_by_caller = with_timeout(caller.wait_for_job(job_id)).await?;
    let seen_by_observer = with_timeout(observer.next_signal()).await?;
    assert_eq!(seen_by_caller, seen_by_observer);
    assert_eq!(seen_by_observer.output, vec!["hashdump /usr/bin/swupd"]);

    daemon.stop().await;
    Ok(())
}

#[tokio::test]
async fn malformed_frames_are_answered_not_dropped() -> TestResult {
    let daemon = start_daemon(OptionTranslator::new("echo"));
    let stream = UnixStream::connect(&daemon.socket).await?;
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    write_half.write_all(b"this is not json\n").await?;
    let line = with_timeout(lines.next_line()).await?.expect("reply line");
    match serde_json::from_str::<ServerFrame>(&line)? {
        ServerFrame::Reply { id, accepted, .. } => {
            assert_eq!(id, 0);
            assert!(!accepted);
        }
        other => panic!("unexpected frame: {other:?}"),
    }

    write_half
        .write_all(b"{\"id\":5,\"method\":\"reboot\"}\n")
        .await?;
    let line = with_timeout(lines.next_line()).await?.expect("reply line");
    match serde_json::from_str::<ServerFrame>(&line)? {
        ServerFrame::Reply {
            id,
            accepted,
            error,
            ..
        } => {
            assert_eq!(id, 5);
            assert!(!accepted);
            assert!(error.unwrap_or_default().contains("unknown method"));
        }
        other => panic!("unexpected frame: {other:?}"),
    }

    // The connection is still usable for a real call.
    write_half
        .write_all(b"{\"id\":6,\"method\":\"update\",\"options\":{\"status\":true}}\n")
        .await?;
    let mut got_reply = false;
    let mut got_signal = false;
    while !(got_reply && got_signal) {
        let line = with_timeout(lines.next_line()).await?.expect("frame line");
        match serde_json::from_str::<ServerFrame>(&line)? {
            ServerFrame::Reply { id, accepted, .. } => {
                assert_eq!(id, 6);
                assert!(accepted);
                got_reply = true;
            }
            ServerFrame::Signal {
                name,
                method,
                output,
                ..
            } => {
                assert_eq!(name, REQUEST_COMPLETED);
                assert_eq!(method, "update");
                assert_eq!(output, vec!["update --status"]);
                got_signal = true;
            }
        }
    }

    daemon.stop().await;
    Ok(())
}
