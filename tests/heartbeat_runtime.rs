// tests/heartbeat_runtime.rs

use std::error::Error;

use tokio::time::Duration;

use datacarrier::engine::{Heartbeat, LoopState, RuntimeOptions};
use datacarrier::errors::CarrierError;
use datacarrier::plan::{Action, ActionPlan, Progress};
use datacarrier::types::DataSource;
use datacarrier_test_utils::{
    Completion, FakeDispatcher, FakeValidator, core_with, init_tracing, single_unit_task,
    with_timeout,
};

type TestResult = Result<(), Box<dyn Error>>;

fn fast_options() -> RuntimeOptions {
    RuntimeOptions {
        interval: Duration::from_millis(5),
        progress_to_stdout: false,
    }
}

#[tokio::test]
async fn loop_stops_when_every_task_succeeds() -> TestResult {
    init_tracing();

    let plan = ActionPlan::for_source(DataSource::Hive);
    let dispatcher = FakeDispatcher::new(Completion::SucceedAfter(Duration::from_millis(10)));
    let probe = dispatcher.probe();

    let (core, store) = core_with(
        &plan,
        vec![single_unit_task("db.a", &plan), single_unit_task("db.b", &plan)],
        10,
        dispatcher,
        FakeValidator::passing(),
    );

    let heartbeat = Heartbeat::new(core, fast_options());
    assert_eq!(heartbeat.state(), LoopState::Running);

    let outcome = with_timeout(heartbeat.spawn().join()).await;

    assert!(outcome.fault.is_none(), "unexpected fault: {:?}", outcome.fault);
    assert!(outcome.is_clean());
    assert_eq!(outcome.summary.total, 2);
    assert_eq!(outcome.summary.succeeded, 2);
    assert!(outcome.ticks > 1);
    assert!(
        outcome
            .snapshot
            .iter()
            .all(|s| s.progress == Progress::Succeeded)
    );
    assert_eq!(probe.shutdowns(), 1);

    let mut lines = store.lines();
    lines.sort();
    assert_eq!(lines, vec!["db.a".to_string(), "db.b".to_string()]);
    Ok(())
}

#[tokio::test]
async fn empty_population_stops_immediately() -> TestResult {
    let plan = ActionPlan::for_source(DataSource::Hive);
    let dispatcher = FakeDispatcher::succeeding();
    let probe = dispatcher.probe();
    let (core, _store) = core_with(&plan, vec![], 10, dispatcher, FakeValidator::passing());

    let outcome = with_timeout(Heartbeat::new(core, fast_options()).run()).await;

    assert!(outcome.fault.is_none());
    assert_eq!(outcome.ticks, 1);
    assert_eq!(outcome.summary.total, 0);
    assert_eq!(probe.shutdowns(), 1);
    Ok(())
}

#[tokio::test]
async fn failed_task_ends_the_run_without_fault() -> TestResult {
    let plan = ActionPlan::for_source(DataSource::Oss);
    let dispatcher = FakeDispatcher::succeeding().on(Action::LoadData, Completion::Fail);
    let (core, store) = core_with(
        &plan,
        vec![single_unit_task("db.t", &plan)],
        10,
        dispatcher,
        FakeValidator::passing(),
    );

    let outcome = with_timeout(Heartbeat::new(core, fast_options()).spawn().join()).await;

    assert!(outcome.fault.is_none());
    assert!(!outcome.is_clean());
    assert_eq!(outcome.summary.failed, 1);
    assert!(store.lines().is_empty());
    Ok(())
}

#[tokio::test]
async fn dispatcher_error_is_saved_as_fault() -> TestResult {
    init_tracing();

    let plan = ActionPlan::for_source(DataSource::Hive);
    let dispatcher = FakeDispatcher::succeeding().error_on(Action::LoadData);
    let probe = dispatcher.probe();
    let (core, _store) = core_with(
        &plan,
        vec![single_unit_task("db.t", &plan)],
        10,
        dispatcher,
        FakeValidator::passing(),
    );

    let outcome = with_timeout(Heartbeat::new(core, fast_options()).spawn().join()).await;

    assert!(matches!(outcome.fault, Some(CarrierError::Dispatch(_))));
    assert!(!outcome.is_clean());
    assert_eq!(outcome.ticks, 1);
    assert_eq!(probe.submitted_for(Action::LoadData).len(), 0);
    assert_eq!(probe.shutdowns(), 0);
    Ok(())
}

#[tokio::test]
async fn validator_panic_is_captured() -> TestResult {
    let plan = ActionPlan::for_source(DataSource::Oss);
    let (core, _store) = core_with(
        &plan,
        vec![single_unit_task("db.boom", &plan)],
        10,
        FakeDispatcher::succeeding(),
        FakeValidator::passing().panicking_for("db.boom"),
    );

    let outcome = with_timeout(Heartbeat::new(core, fast_options()).spawn().join()).await;

    match outcome.fault {
        Some(CarrierError::LoopPanicked(msg)) => assert!(msg.contains("validator exploded")),
        other => panic!("expected a captured panic, got {other:?}"),
    }
    Ok(())
}
