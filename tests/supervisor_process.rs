// tests/supervisor_process.rs
#![cfg(unix)]

use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;
use std::time::Duration;

use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;

use tokio::sync::mpsc;

use swupdd::engine::{CancelMode, DaemonEvent, JobController, JobSpec, Runtime};
use swupdd::exec::supervisor::{OUTPUT_DRAIN_TIMEOUT, exit_status_code};
use swupdd::exec::{RealProcessBackend, supervise};
use swupdd::options::OptionTranslator;
use swupdd::types::{ArgumentVector, MethodKind};
use swupdd_test_utils::builders::CallBuilder;
use swupdd_test_utils::notifier::ChannelNotifier;
use swupdd_test_utils::{init_tracing, send_call, with_timeout};

fn job(tokens: &[&str]) -> JobSpec {
    JobSpec {
        job_id: 7,
        method: MethodKind::Verify,
        argv: ArgumentVector::new(tokens.iter().map(|t| t.to_string()).collect()),
    }
}

/// Run one job through the supervisor, optionally cancelling it, and return
/// the single termination report.
async fn run_job(spec: JobSpec, cancel: Option<CancelMode>) -> (u64, i32, Vec<String>) {
    init_tracing();

    let (tx, mut rx) = mpsc::channel(4);
    let (signals_tx, signals_rx) = mpsc::unbounded_channel();
    if let Some(mode) = cancel {
        signals_tx.send(mode).unwrap();
    }

    with_timeout(supervise(spec, signals_rx, tx)).await;

    let report = rx.recv().await.expect("supervisor sent no report");
    assert!(rx.recv().await.is_none(), "more than one report");

    match report {
        DaemonEvent::ChildTerminated {
            job_id,
            status,
            output,
        } => (job_id, status, output),
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn exit_code_and_both_streams_are_reported() {
    let (job_id, status, output) = run_job(
        job(&["sh", "-c", "echo to-stdout; echo to-stderr 1>&2; exit 3"]),
        None,
    )
    .await;

    assert_eq!(job_id, 7);
    assert_eq!(status, 3);
    assert_eq!(output, vec!["to-stdout", "to-stderr"]);
}

#[tokio::test]
async fn interleaved_streams_keep_write_order() {
    let script = "echo 1; echo 2 >&2; echo 3; echo 4 >&2; echo 5; echo 6 >&2";

    for _ in 0..20 {
        let (_, status, output) = run_job(job(&["sh", "-c", script]), None).await;
        assert_eq!(status, 0);
        assert_eq!(output, vec!["1", "2", "3", "4", "5", "6"]);
    }
}

#[tokio::test]
async fn background_process_holding_the_pipe_does_not_block_the_report() {
    // The backgrounded sleep keeps the output pipe open after `sh` exits.
    let started = tokio::time::Instant::now();
    let (_, status, output) = run_job(job(&["sh", "-c", "sleep 30 & echo $!"]), None).await;

    assert_eq!(status, 0);
    assert_eq!(output.len(), 1);
    assert!(started.elapsed() < OUTPUT_DRAIN_TIMEOUT + Duration::from_secs(2));

    let pid: i32 = output[0].trim().parse().expect("pid of background sleep");
    let _ = kill(Pid::from_raw(pid), Signal::SIGKILL);
}

#[tokio::test]
async fn lines_from_one_stream_keep_their_order() {
    let (_, status, output) = run_job(job(&["sh", "-c", "printf 'a\\nb\\nc'"]), None).await;

    assert_eq!(status, 0);
    // The last line has no newline but is still reported.
    assert_eq!(output, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn missing_program_reports_spawn_failure() {
    let (_, status, output) = run_job(job(&["/nonexistent/swupd", "update"]), None).await;

    assert_eq!(status, -1);
    assert_eq!(output.len(), 1);
    assert!(output[0].contains("failed to launch"), "output: {output:?}");
}

#[tokio::test]
async fn graceful_cancel_interrupts_the_child() {
    let (_, status, output) =
        run_job(job(&["sleep", "30"]), Some(CancelMode::Graceful)).await;

    assert_eq!(status, 130);
    assert!(output.is_empty());
}

#[tokio::test]
async fn forced_cancel_kills_the_child() {
    let (_, status, _) = run_job(job(&["sleep", "30"]), Some(CancelMode::Forced)).await;
    assert_eq!(status, 130);
}

#[test]
fn exit_status_mapping() {
    assert_eq!(exit_status_code(ExitStatus::from_raw(0)), 0);
    assert_eq!(exit_status_code(ExitStatus::from_raw(3 << 8)), 3);
    // Terminated by SIGKILL.
    assert_eq!(exit_status_code(ExitStatus::from_raw(9)), 130);
}

#[tokio::test]
async fn runtime_recovers_from_missing_update_tool() {
    init_tracing();

    let (tx, rx) = mpsc::channel(16);
    let backend = RealProcessBackend::new(tx.clone());
    let (notifier, mut events) = ChannelNotifier::new();
    let controller = JobController::new(OptionTranslator::new("/nonexistent/swupd"));
    let runtime = tokio::spawn(Runtime::new(controller, rx, backend, notifier).run());

    let accepted = send_call(&tx, CallBuilder::new(MethodKind::Update).build())
        .await
        .unwrap();
    assert_eq!(accepted.job_id, Some(1));

    let event = with_timeout(events.recv()).await.unwrap();
    assert_eq!(event.job_id, Some(1));
    assert_eq!(event.status, -1);
    assert!(event.output[0].contains("/nonexistent/swupd"));

    // Back to idle: the next call is accepted.
    let accepted = send_call(&tx, CallBuilder::new(MethodKind::Verify).build())
        .await
        .unwrap();
    assert_eq!(accepted.job_id, Some(2));
    let event = with_timeout(events.recv()).await.unwrap();
    assert_eq!(event.method, "verify");

    tx.send(DaemonEvent::ShutdownRequested).await.unwrap();
    with_timeout(runtime).await.unwrap().unwrap();
}
