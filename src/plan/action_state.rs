// src/plan/action_state.rs

//! Per-task, per-action state and the execution units inside it.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::engine::TaskName;
use crate::plan::action::Action;
use crate::plan::progress::{Progress, ProgressCell};

/// Identifier of an execution unit, unique within its (task, action) pair.
pub type UnitId = String;

/// Terminal result reported by an executor for one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitOutcome {
    Succeeded,
    Failed,
}

/// Smallest schedulable piece of work for one action of one task.
#[derive(Debug)]
pub struct ExecutionUnit {
    id: UnitId,
    progress: Arc<ProgressCell>,
}

impl ExecutionUnit {
    pub fn new(id: impl Into<UnitId>) -> Self {
        Self {
            id: id.into(),
            progress: Arc::new(ProgressCell::default()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn progress(&self) -> Progress {
        self.progress.load()
    }
}

/// Handle given to a dispatcher for a unit it now owns.
///
/// The handle is the only way out of `Running`: [`UnitHandle::finish`]
/// succeeds exactly once and never regresses a terminal unit.
#[derive(Debug, Clone)]
pub struct UnitHandle {
    task: TaskName,
    action: Action,
    unit: UnitId,
    progress: Arc<ProgressCell>,
}

impl UnitHandle {
    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn progress(&self) -> Progress {
        self.progress.load()
    }

    /// Record the terminal outcome. Returns `false` if the unit was not
    /// `Running` (already finished, or never admitted).
    pub fn finish(&self, outcome: UnitOutcome) -> bool {
        let to = match outcome {
            UnitOutcome::Succeeded => Progress::Succeeded,
            UnitOutcome::Failed => Progress::Failed,
        };
        let changed = self.progress.transition(Progress::Running, to);
        if !changed {
            debug!(
                task = %self.task,
                action = %self.action,
                unit = %self.unit,
                current = %self.progress.load(),
                "ignoring completion for unit that is not running"
            );
        }
        changed
    }

    pub fn succeed(&self) -> bool {
        self.finish(UnitOutcome::Succeeded)
    }

    pub fn fail(&self) -> bool {
        self.finish(UnitOutcome::Failed)
    }
}

/// Aggregate progress of one action of a task plus its execution units.
///
/// Units are fixed at construction; only their progress cells change.
#[derive(Debug)]
pub struct ActionState {
    action: Action,
    progress: ProgressCell,
    units: BTreeMap<UnitId, ExecutionUnit>,
}

impl ActionState {
    pub fn new<I, S>(action: Action, unit_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<UnitId>,
    {
        let units = unit_ids
            .into_iter()
            .map(|id| {
                let unit = ExecutionUnit::new(id);
                (unit.id.clone(), unit)
            })
            .collect();

        Self {
            action,
            progress: ProgressCell::default(),
            units,
        }
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn progress(&self) -> Progress {
        self.progress.load()
    }

    pub fn units(&self) -> impl Iterator<Item = &ExecutionUnit> {
        self.units.values()
    }

    pub fn unit_progress(&self, unit: &str) -> Option<Progress> {
        self.units.get(unit).map(ExecutionUnit::progress)
    }

    pub fn has_units(&self) -> bool {
        !self.units.is_empty()
    }

    pub fn has_new_units(&self) -> bool {
        self.units.values().any(|u| u.progress() == Progress::New)
    }

    /// Ids of units still waiting to be admitted, in id order.
    pub fn new_unit_ids(&self) -> Vec<UnitId> {
        self.units
            .values()
            .filter(|u| u.progress() == Progress::New)
            .map(|u| u.id.clone())
            .collect()
    }

    pub fn running_units(&self) -> usize {
        self.units
            .values()
            .filter(|u| u.progress() == Progress::Running)
            .count()
    }

    /// Promote a `New` unit to `Running` and hand out its dispatch handle.
    pub(crate) fn start_unit(&self, task: &str, unit: &str) -> Option<UnitHandle> {
        let u = self.units.get(unit)?;
        if !u.progress.transition(Progress::New, Progress::Running) {
            return None;
        }
        Some(UnitHandle {
            task: task.to_string(),
            action: self.action,
            unit: u.id.clone(),
            progress: Arc::clone(&u.progress),
        })
    }

    /// Set the aggregate directly. Used for unit-less stages, whose progress
    /// is decided by the scheduler rather than by units.
    pub(crate) fn set_progress(&self, progress: Progress) {
        self.progress.store(progress);
    }

    /// Force every unit and the aggregate to `Succeeded`.
    pub(crate) fn mark_succeeded(&self) {
        for unit in self.units.values() {
            unit.progress.store(Progress::Succeeded);
        }
        self.progress.store(Progress::Succeeded);
    }

    /// Re-derive the aggregate from the live unit cells.
    ///
    /// Unit-less stages keep whatever the scheduler last stored.
    pub(crate) fn refresh(&self) -> Progress {
        if self.units.is_empty() {
            return self.progress.load();
        }
        let progress = Progress::aggregate(self.units.values().map(ExecutionUnit::progress));
        self.progress.store(progress);
        progress
    }
}
