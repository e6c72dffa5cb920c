// tests/job_controller.rs

use swupdd::engine::{CancelMode, ControllerCommand, JobController, JobSpec, JobState};
use swupdd::errors::SwupddError;
use swupdd::exec::{INTERRUPTED_STATUS, SPAWN_FAILURE_STATUS};
use swupdd::notify::CompletionEvent;
use swupdd::options::OptionTranslator;
use swupdd::types::{ArgumentVector, MethodKind, UnknownOptionPolicy};
use swupdd_test_utils::builders::CallBuilder;

fn controller() -> JobController {
    JobController::new(OptionTranslator::new("swupd"))
}

fn check_update(bundle: &str) -> CallBuilder {
    CallBuilder::new(MethodKind::CheckUpdate).arg(bundle)
}

fn launched(commands: &[ControllerCommand]) -> &JobSpec {
    match commands {
        [ControllerCommand::Launch(job)] => job,
        other => panic!("expected a single Launch, got {other:?}"),
    }
}

#[test]
fn idle_controller_accepts_and_launches() {
    let mut ctl = controller();
    assert!(ctl.is_idle());

    let commands = ctl.handle_call(check_update("os-core").build()).unwrap();
    let job = launched(&commands);

    assert_eq!(job.job_id, 1);
    assert_eq!(job.method, MethodKind::CheckUpdate);
    assert_eq!(
        job.argv,
        ArgumentVector::new(vec![
            "swupd".to_string(),
            "check-update".to_string(),
            "os-core".to_string(),
        ])
    );

    let active = ctl.active_job().expect("job should be running");
    assert_eq!(active.job_id, 1);
    assert_eq!(active.method, MethodKind::CheckUpdate);
}

#[test]
fn second_call_while_running_is_busy() {
    let mut ctl = controller();
    ctl.handle_call(check_update("os-core").build()).unwrap();
    let before = ctl.state();

    let err = ctl
        .handle_call(CallBuilder::new(MethodKind::Update).build())
        .unwrap_err();

    assert!(matches!(err, SwupddError::Busy));
    assert_eq!(ctl.state(), before);
}

#[test]
fn busy_is_reported_before_option_errors() {
    let mut ctl = controller();
    ctl.handle_call(check_update("os-core").build()).unwrap();

    // Missing positional would be InvalidArguments if idle.
    let err = ctl
        .handle_call(CallBuilder::new(MethodKind::HashDump).build())
        .unwrap_err();

    assert!(matches!(err, SwupddError::Busy));
}

#[test]
fn rejected_request_leaves_controller_idle() {
    let mut ctl = controller();

    let err = ctl
        .handle_call(CallBuilder::new(MethodKind::Update).flag("url", true).build())
        .unwrap_err();
    assert!(matches!(err, SwupddError::InvalidOption { .. }));
    assert!(ctl.is_idle());

    // No job id was consumed by the rejected call.
    let commands = ctl.handle_call(CallBuilder::new(MethodKind::Update).build()).unwrap();
    assert_eq!(launched(&commands).job_id, 1);
}

#[test]
fn cancel_while_idle_is_an_error() {
    let mut ctl = controller();

    let err = ctl
        .handle_call(CallBuilder::new(MethodKind::Cancel).build())
        .unwrap_err();

    assert!(matches!(err, SwupddError::NoActiveJob));
    assert!(ctl.is_idle());
}

#[test]
fn idle_cancel_ignores_its_options() {
    let mut ctl = controller();

    let err = ctl
        .handle_call(CallBuilder::new(MethodKind::Cancel).string("force", "now").build())
        .unwrap_err();
    assert!(matches!(err, SwupddError::NoActiveJob));

    let mut strict = JobController::new(
        OptionTranslator::new("swupd").with_unknown_options(UnknownOptionPolicy::Reject),
    );
    let err = strict
        .handle_call(CallBuilder::new(MethodKind::Cancel).flag("bogus", true).build())
        .unwrap_err();
    assert!(matches!(err, SwupddError::NoActiveJob));
}

#[test]
fn malformed_cancel_leaves_the_running_job_alone() {
    let mut ctl = controller();
    ctl.handle_call(CallBuilder::new(MethodKind::Update).build()).unwrap();

    let err = ctl
        .handle_call(CallBuilder::new(MethodKind::Cancel).string("force", "now").build())
        .unwrap_err();

    assert!(matches!(err, SwupddError::InvalidOption { .. }));
    assert!(!ctl.is_idle());
}

#[test]
fn cancel_signals_the_running_job_and_echoes() {
    let mut ctl = controller();
    ctl.handle_call(CallBuilder::new(MethodKind::Update).build()).unwrap();

    let commands = ctl
        .handle_call(CallBuilder::new(MethodKind::Cancel).build())
        .unwrap();

    assert_eq!(
        commands,
        vec![
            ControllerCommand::Signal {
                job_id: 1,
                mode: CancelMode::Graceful,
            },
            ControllerCommand::Notify(CompletionEvent::cancel_echo()),
        ]
    );
    // The slot stays taken until the child is actually gone.
    assert!(!ctl.is_idle());
}

#[test]
fn forced_cancel_requests_a_kill() {
    let mut ctl = controller();
    ctl.handle_call(CallBuilder::new(MethodKind::Verify).build()).unwrap();

    let commands = ctl
        .handle_call(CallBuilder::new(MethodKind::Cancel).flag("force", true).build())
        .unwrap();

    assert_eq!(
        commands[0],
        ControllerCommand::Signal {
            job_id: 1,
            mode: CancelMode::Forced,
        }
    );
}

#[test]
fn cancel_echo_has_no_job_and_zero_status() {
    let echo = CompletionEvent::cancel_echo();
    assert_eq!(echo.job_id, None);
    assert_eq!(echo.method, "cancel");
    assert_eq!(echo.status, 0);
    assert!(echo.output.is_empty());
}

#[test]
fn termination_releases_slot_and_notifies() {
    let mut ctl = controller();
    ctl.handle_call(
        CallBuilder::new(MethodKind::BundleAdd)
            .flag("list", true)
            .build(),
    )
    .unwrap();

    let output = vec!["Bundles available:".to_string(), "os-core".to_string()];
    let commands = ctl.child_terminated(1, 0, output.clone());

    assert_eq!(
        commands,
        vec![ControllerCommand::Notify(CompletionEvent::for_job(
            1,
            MethodKind::BundleAdd,
            0,
            output,
        ))]
    );
    assert_eq!(ctl.state(), JobState::Idle);
}

#[test]
fn spawn_failure_and_interruption_are_reported_like_any_exit() {
    let mut ctl = controller();

    ctl.handle_call(CallBuilder::new(MethodKind::Update).build()).unwrap();
    let commands = ctl.child_terminated(1, SPAWN_FAILURE_STATUS, vec!["no such file".into()]);
    match &commands[..] {
        [ControllerCommand::Notify(event)] => {
            assert_eq!(event.status, -1);
            assert_eq!(event.method, "update");
            assert!(!event.succeeded());
        }
        other => panic!("unexpected commands: {other:?}"),
    }

    ctl.handle_call(CallBuilder::new(MethodKind::Verify).build()).unwrap();
    let commands = ctl.child_terminated(2, INTERRUPTED_STATUS, Vec::new());
    match &commands[..] {
        [ControllerCommand::Notify(event)] => {
            assert_eq!(event.job_id, Some(2));
            assert_eq!(event.status, 130);
        }
        other => panic!("unexpected commands: {other:?}"),
    }
    assert!(ctl.is_idle());
}

#[test]
fn stale_termination_reports_are_ignored() {
    let mut ctl = controller();

    // Nothing running yet.
    assert!(ctl.child_terminated(1, 0, Vec::new()).is_empty());

    ctl.handle_call(CallBuilder::new(MethodKind::Update).build()).unwrap();
    ctl.child_terminated(1, 0, Vec::new());
    ctl.handle_call(CallBuilder::new(MethodKind::Verify).build()).unwrap();

    // A late duplicate for job 1 must not free job 2's slot.
    assert!(ctl.child_terminated(1, 0, Vec::new()).is_empty());
    assert_eq!(ctl.active_job().map(|j| j.job_id), Some(2));
}

#[test]
fn job_ids_increase_across_jobs() {
    let mut ctl = controller();

    for expected in 1..=3 {
        let commands = ctl.handle_call(check_update("os-core").build()).unwrap();
        assert_eq!(launched(&commands).job_id, expected);
        ctl.child_terminated(expected, 0, Vec::new());
    }
}

#[test]
fn submit_bypasses_translation_but_not_busy() {
    let mut ctl = controller();
    let argv = ArgumentVector::new(vec!["swupd".into(), "update".into()]);

    let commands = ctl.submit(MethodKind::Update, argv.clone()).unwrap();
    assert_eq!(launched(&commands).argv, argv);

    assert!(matches!(
        ctl.submit(MethodKind::Update, argv),
        Err(SwupddError::Busy)
    ));
}
