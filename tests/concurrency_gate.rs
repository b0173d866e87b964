// tests/concurrency_gate.rs

use datacarrier::config::ConcurrencySection;
use datacarrier::engine::{Admission, ConcurrencyGate, SchedulerCore, SkipReason};
use datacarrier::plan::{Action, ActionPlan, Progress, UnitOutcome};
use datacarrier::types::DataSource;
use datacarrier_test_utils::{
    FakeDispatcher, FakeValidator, TaskBuilder, core_with, init_tracing, memory_failover,
    plan_of, single_unit_task,
};

#[test]
fn load_data_never_exceeds_ceiling_of_two() {
    init_tracing();

    let plan = plan_of(&[Action::LoadData]);
    let tasks = vec![
        single_unit_task("db.t1", &plan),
        single_unit_task("db.t2", &plan),
        single_unit_task("db.t3", &plan),
    ];
    let dispatcher = FakeDispatcher::holding();
    let probe = dispatcher.probe();
    let (mut core, _store) = core_with(&plan, tasks, 2, dispatcher, FakeValidator::passing());

    let first = core.tick().expect("tick");
    assert_eq!(first.admitted_for(Action::LoadData), 2);
    assert_eq!(
        first.admitted.iter().map(|u| u.task.as_str()).collect::<Vec<_>>(),
        vec!["db.t1", "db.t2"]
    );

    for _ in 0..5 {
        let report = core.tick().expect("tick");
        assert!(report.admitted.is_empty());
        assert_eq!(
            report.gated,
            vec![(
                Action::LoadData,
                SkipReason::Saturated {
                    in_flight: 2,
                    ceiling: 2
                }
            )]
        );
        assert!(ConcurrencyGate::in_flight(Action::LoadData, core.tasks()) <= 2);
    }
    assert_eq!(probe.submitted().len(), 2);

    // One completion frees exactly one slot.
    probe.release_task("db.t1", UnitOutcome::Succeeded);
    let report = core.tick().expect("tick");
    assert_eq!(report.admitted.len(), 1);
    assert_eq!(report.admitted[0].task, "db.t3");
    assert_eq!(ConcurrencyGate::in_flight(Action::LoadData, core.tasks()), 2);
}

#[test]
fn one_task_may_burst_past_the_ceiling_within_a_tick() {
    let plan = plan_of(&[Action::LoadData]);
    let tasks = vec![
        TaskBuilder::new("db.wide", &plan)
            .unit_count(Action::LoadData, 3)
            .build(),
        single_unit_task("db.narrow", &plan),
    ];
    let dispatcher = FakeDispatcher::holding();
    let probe = dispatcher.probe();
    let (mut core, _store) = core_with(&plan, tasks, 2, dispatcher, FakeValidator::passing());

    let report = core.tick().expect("tick");
    assert_eq!(report.admitted_for(Action::LoadData), 3);
    assert!(report.admitted.iter().all(|u| u.task == "db.wide"));
    assert_eq!(ConcurrencyGate::in_flight(Action::LoadData, core.tasks()), 3);

    // The overshoot blocks the next tick entirely.
    let report = core.tick().expect("tick");
    assert!(report.admitted.is_empty());
    assert_eq!(
        core.task("db.narrow").expect("task").action_progress(Action::LoadData),
        Some(Progress::New)
    );

    probe.release_task("db.wide", UnitOutcome::Succeeded);
    let report = core.tick().expect("tick");
    assert_eq!(report.admitted.len(), 1);
    assert_eq!(report.admitted[0].task, "db.narrow");
}

#[test]
fn ceilings_are_per_action() {
    let plan = plan_of(&[Action::CreateTable, Action::LoadData]);
    let tasks = vec![
        single_unit_task("db.t1", &plan),
        single_unit_task("db.t2", &plan),
    ];
    let dispatcher = FakeDispatcher::holding();
    let probe = dispatcher.probe();
    let (mut core, _store) = core_with(&plan, tasks, 1, dispatcher, FakeValidator::passing());

    core.tick().expect("tick");
    assert_eq!(probe.submitted_for(Action::CreateTable).len(), 1);

    probe.release_task("db.t1", UnitOutcome::Succeeded);
    let report = core.tick().expect("tick");
    // t2 takes the freed create_table slot while t1 starts loading.
    assert_eq!(report.admitted_for(Action::CreateTable), 1);
    assert_eq!(report.admitted_for(Action::LoadData), 1);
}

#[test]
fn unconfigured_action_is_skipped_but_others_proceed() {
    init_tracing();

    let plan = plan_of(&[Action::CreateTable, Action::AddPartition]);
    let dispatcher = FakeDispatcher::succeeding();
    let probe = dispatcher.probe();

    let (failover, _store) = memory_failover(&[]);
    let gate = ConcurrencyGate::uniform(&plan, 10).without(Action::AddPartition);
    let mut core = SchedulerCore::new(
        plan.clone(),
        vec![single_unit_task("db.t", &plan)],
        gate,
        failover,
        dispatcher,
        FakeValidator::passing(),
    );

    for _ in 0..3 {
        let report = core.tick().expect("unconfigured action must not fault");
        assert!(!report.all_finished);
        assert!(report
            .gated
            .contains(&(Action::AddPartition, SkipReason::Unconfigured)));
    }

    assert_eq!(probe.submitted().len(), 1);
    let task = core.task("db.t").expect("task");
    assert_eq!(task.action_progress(Action::CreateTable), Some(Progress::Succeeded));
    assert_eq!(task.action_progress(Action::AddPartition), Some(Progress::New));
}

#[test]
fn compare_stage_is_never_gated() {
    let plan = ActionPlan::for_source(DataSource::Hive);
    let gate = ConcurrencyGate::uniform(&plan, 1);

    assert_eq!(gate.ceiling(Action::CompareResults), None);
    assert_eq!(gate.admission(Action::CompareResults, &[]), Admission::Ungated);
    assert_eq!(
        gate.admission(Action::LoadData, &[]),
        Admission::Open {
            in_flight: 0,
            ceiling: 1
        }
    );
}

#[test]
fn gate_from_config_applies_overrides() {
    let mut section = ConcurrencySection::default();
    section.default = 7;
    section.actions.insert(Action::LoadData, 3);

    let plan = ActionPlan::for_source(DataSource::Oss);
    let gate = ConcurrencyGate::from_config(&section, &plan);

    assert_eq!(gate.ceiling(Action::LoadData), Some(3));
    assert_eq!(gate.ceiling(Action::CreateExternalTable), Some(7));
    assert_eq!(gate.ceiling(Action::ValidateSource), None);
    assert_eq!(gate.ceiling(Action::CompareResults), None);
}
