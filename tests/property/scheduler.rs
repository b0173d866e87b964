use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use proptest::prelude::*;

use datacarrier::engine::{ConcurrencyGate, FailoverLog, FileFailoverStore};
use datacarrier::fs::RealFileSystem;
use datacarrier::plan::{Action, Progress, UnitOutcome};
use datacarrier_test_utils::{FakeDispatcher, FakeValidator, TaskBuilder, core_with, plan_of};

const ACTIONS: [Action; 3] = [Action::CreateTable, Action::AddPartition, Action::LoadData];

fn progress_strategy() -> impl Strategy<Value = Progress> {
    prop_oneof![
        Just(Progress::New),
        Just(Progress::Running),
        Just(Progress::Succeeded),
        Just(Progress::Failed),
    ]
}

/// Per task: unit counts for each action in `ACTIONS`, and whether the task
/// fails when its units are released.
fn population_strategy() -> impl Strategy<Value = Vec<([usize; 3], bool)>> {
    proptest::collection::vec(
        ((0..3usize, 0..3usize, 0..4usize).prop_map(|(a, b, c)| [a, b, c]), any::<bool>()),
        0..6,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn aggregation_law(children in proptest::collection::vec(progress_strategy(), 0..8)) {
        let agg = Progress::aggregate(children.iter().copied());

        if children.contains(&Progress::Failed) {
            prop_assert_eq!(agg, Progress::Failed);
        } else if !children.is_empty() && children.iter().all(|p| *p == Progress::Succeeded) {
            prop_assert_eq!(agg, Progress::Succeeded);
        } else {
            prop_assert!(!agg.is_terminal());
        }
    }

    #[test]
    fn scheduler_respects_dependencies_and_ceilings(
        population in population_strategy(),
        ceiling in 1..4usize,
    ) {
        let plan = plan_of(&ACTIONS);
        let tasks: Vec<_> = population
            .iter()
            .enumerate()
            .map(|(i, (units, _))| {
                let mut b = TaskBuilder::new(&format!("db.t{i}"), &plan);
                for (action, n) in ACTIONS.iter().zip(units.iter()) {
                    b = b.unit_count(*action, *n);
                }
                b.build()
            })
            .collect();
        let max_units = population
            .iter()
            .flat_map(|(units, _)| units.iter().copied())
            .max()
            .unwrap_or(0);

        let dispatcher = FakeDispatcher::holding();
        let probe = dispatcher.probe();
        let (mut core, store) =
            core_with(&plan, tasks, ceiling, dispatcher, FakeValidator::passing());

        let mut finished = false;
        for tick in 0..200usize {
            // At most one burst over the ceiling can be in flight.
            for action in ACTIONS {
                let running = ConcurrencyGate::in_flight(action, core.tasks());
                prop_assert!(running <= ceiling.max(ceiling - 1 + max_units));
            }

            let report = core.tick().expect("tick");
            if report.all_finished {
                finished = true;
                break;
            }

            for unit in &report.admitted {
                let task = core.task(&unit.task).expect("admitted task exists");
                let pos = ACTIONS.iter().position(|a| *a == unit.action).expect("known action");
                for earlier in &ACTIONS[..pos] {
                    prop_assert_eq!(task.action_progress(*earlier), Some(Progress::Succeeded));
                }
            }

            // Release one task per tick so work accumulates against the gate.
            if !population.is_empty() {
                let idx = tick % population.len();
                let outcome = if population[idx].1 {
                    UnitOutcome::Failed
                } else {
                    UnitOutcome::Succeeded
                };
                probe.release_task(&format!("db.t{idx}"), outcome);
            }
        }
        prop_assert!(finished);

        let mut expected_succeeded = BTreeSet::new();
        for (i, (units, fails)) in population.iter().enumerate() {
            let name = format!("db.t{i}");
            let progress = core.task(&name).expect("task").progress();
            let has_units = units.iter().any(|n| *n > 0);
            if *fails && has_units {
                prop_assert_eq!(progress, Progress::Failed);
            } else {
                prop_assert_eq!(progress, Progress::Succeeded);
                expected_succeeded.insert(name);
            }
        }

        let lines = store.lines();
        let recorded: BTreeSet<String> = lines.iter().cloned().collect();
        prop_assert_eq!(lines.len(), recorded.len());
        prop_assert_eq!(recorded, expected_succeeded);
    }

    #[test]
    fn failover_round_trip(names in proptest::collection::hash_set("[a-z]{1,6}\\.[a-z]{1,6}", 0..12)) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("failover.out");

        let mut log = FailoverLog::open(Box::new(FileFailoverStore::new(
            Arc::new(RealFileSystem),
            path.clone(),
        )));
        for name in &names {
            prop_assert!(log.record(name));
        }

        let reopened = FailoverLog::open(Box::new(FileFailoverStore::new(
            Arc::new(RealFileSystem),
            path,
        )));
        let expected: HashSet<String> = names.iter().cloned().collect();
        prop_assert_eq!(reopened.finished(), &expected);
    }
}
