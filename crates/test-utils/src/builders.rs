#![allow(dead_code)]

use std::collections::BTreeMap;

use datacarrier::engine::{
    ConcurrencyGate, FailoverLog, MemoryFailoverStore, SchedulerCore,
};
use datacarrier::exec::{Dispatcher, Validator};
use datacarrier::plan::{Action, ActionPlan, Task, UnitId};
use datacarrier::types::DataSource;

/// Plan over an explicit action list, for a Hive source.
pub fn plan_of(actions: &[Action]) -> ActionPlan {
    ActionPlan::new(DataSource::Hive, actions.to_vec()).expect("test plan must be valid")
}

/// Builder for `Task` to simplify test setup.
///
/// Every gated action of the plan gets one unit named `"0"` unless
/// overridden.
pub struct TaskBuilder {
    name: String,
    plan: ActionPlan,
    units: BTreeMap<Action, Vec<UnitId>>,
    destination: Option<String>,
}

impl TaskBuilder {
    pub fn new(name: &str, plan: &ActionPlan) -> Self {
        let units = plan
            .gated_actions()
            .map(|a| (a, vec!["0".to_string()]))
            .collect();
        Self {
            name: name.to_string(),
            plan: plan.clone(),
            units,
            destination: None,
        }
    }

    pub fn units(mut self, action: Action, ids: &[&str]) -> Self {
        self.units
            .insert(action, ids.iter().map(|s| s.to_string()).collect());
        self
    }

    /// `n` units named `"0"..n`.
    pub fn unit_count(mut self, action: Action, n: usize) -> Self {
        self.units
            .insert(action, (0..n).map(|i| i.to_string()).collect());
        self
    }

    pub fn no_units(self, action: Action) -> Self {
        self.units(action, &[])
    }

    pub fn destination(mut self, dst: &str) -> Self {
        self.destination = Some(dst.to_string());
        self
    }

    pub fn build(self) -> Task {
        let task =
            Task::from_plan(self.name, &self.plan, self.units).expect("test task must be valid");
        match self.destination {
            Some(dst) => task.with_destination(dst),
            None => task,
        }
    }
}

/// A task with exactly one unit per gated action.
pub fn single_unit_task(name: &str, plan: &ActionPlan) -> Task {
    TaskBuilder::new(name, plan).build()
}

/// Failover log over an in-memory store, plus a handle to that store.
pub fn memory_failover(lines: &[&str]) -> (FailoverLog, MemoryFailoverStore) {
    let store = MemoryFailoverStore::with_lines(lines.iter().copied());
    let log = FailoverLog::open(Box::new(store.clone()));
    (log, store)
}

/// Core with a uniform ceiling and an empty in-memory failover log.
pub fn core_with<D: Dispatcher, V: Validator>(
    plan: &ActionPlan,
    tasks: Vec<Task>,
    ceiling: usize,
    dispatcher: D,
    validator: V,
) -> (SchedulerCore<D, V>, MemoryFailoverStore) {
    let (failover, store) = memory_failover(&[]);
    let gate = ConcurrencyGate::uniform(plan, ceiling);
    let core = SchedulerCore::new(plan.clone(), tasks, gate, failover, dispatcher, validator);
    (core, store)
}
