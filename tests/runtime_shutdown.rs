// tests/runtime_shutdown.rs
#![cfg(unix)]

// Kept as the only test in this binary: writing a script and exec'ing it
// while other tests fork can fail with ETXTBSY.

use std::error::Error;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use tokio::sync::mpsc;

use swupdd::engine::{DaemonEvent, JobController, Runtime};
use swupdd::exec::RealProcessBackend;
use swupdd::options::OptionTranslator;
use swupdd::types::MethodKind;
use swupdd_test_utils::builders::CallBuilder;
use swupdd_test_utils::notifier::ChannelNotifier;
use swupdd_test_utils::{init_tracing, send_call, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

async fn wait_for_pid(path: &std::path::Path) -> i32 {
    loop {
        if let Ok(text) = fs::read_to_string(path) {
            if let Ok(pid) = text.trim().parse::<i32>() {
                return pid;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn shutdown_kills_and_reaps_the_running_tool() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let pid_file = dir.path().join("tool.pid");
    let tool = dir.path().join("fake-swupd");
    fs::write(
        &tool,
        format!("#!/bin/sh\necho $$ > {}\nexec sleep 30\n", pid_file.display()),
    )?;
    fs::set_permissions(&tool, fs::Permissions::from_mode(0o755))?;

    let (tx, rx) = mpsc::channel::<DaemonEvent>(32);
    let backend = RealProcessBackend::new(tx.clone());
    let (notifier, mut events) = ChannelNotifier::new();
    let controller = JobController::new(OptionTranslator::new(tool.to_string_lossy()));
    let runtime = tokio::spawn(Runtime::new(controller, rx, backend, notifier).run());

    let accepted = send_call(&tx, CallBuilder::new(MethodKind::Update).build()).await?;
    assert_eq!(accepted.job_id, Some(1));

    let pid = with_timeout(wait_for_pid(&pid_file)).await;
    assert_eq!(kill(Pid::from_raw(pid), None), Ok(()));

    tx.send(DaemonEvent::ShutdownRequested).await?;
    with_timeout(runtime).await??;

    // Killed and reaped: the pid no longer exists, not even as a zombie.
    assert_eq!(kill(Pid::from_raw(pid), None), Err(Errno::ESRCH));
    assert!(events.try_recv().is_err());
    Ok(())
}
