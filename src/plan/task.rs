// src/plan/task.rs

//! One table's end-to-end migration.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;

use crate::engine::TaskName;
use crate::errors::{CarrierError, Result};
use crate::plan::action::{Action, ActionPlan};
use crate::plan::action_state::{ActionState, UnitHandle, UnitId};
use crate::plan::progress::{Progress, ProgressCell};

/// A table migration: the plan's actions in order, each with its own state.
///
/// All progress lives in atomic cells, so a `&Task` is enough both for the
/// scheduler promoting aggregates and for executors finishing units.
#[derive(Debug)]
pub struct Task {
    name: TaskName,
    destination: Option<String>,
    actions: Vec<Action>,
    states: HashMap<Action, ActionState>,
    progress: ProgressCell,
}

impl Task {
    /// Build a task for `plan`, seeding each gated action with `units`.
    ///
    /// Every gated action of the plan must have an entry (possibly empty);
    /// entries for actions outside the plan, or for the compare stage, are
    /// rejected.
    pub fn from_plan(
        name: impl Into<TaskName>,
        plan: &ActionPlan,
        mut units: BTreeMap<Action, Vec<UnitId>>,
    ) -> Result<Self> {
        let name = name.into();
        let mut states = HashMap::new();

        for &action in plan.actions() {
            let state = if action.is_validation() {
                if units.remove(&action).is_some() {
                    return Err(CarrierError::InvalidPlan(format!(
                        "task {name}: {action} cannot carry execution units"
                    )));
                }
                ActionState::new(action, Vec::<UnitId>::new())
            } else {
                let ids = units.remove(&action).ok_or_else(|| {
                    CarrierError::InvalidPlan(format!(
                        "task {name}: no execution units seeded for {action}"
                    ))
                })?;
                ActionState::new(action, ids)
            };
            states.insert(action, state);
        }

        if let Some(extra) = units.keys().next() {
            return Err(CarrierError::InvalidPlan(format!(
                "task {name}: {extra} is not part of the {} plan",
                plan.source()
            )));
        }

        Ok(Self {
            name,
            destination: None,
            actions: plan.actions().to_vec(),
            states,
            progress: ProgressCell::default(),
        })
    }

    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    /// Qualified table name (`database.table`).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn destination(&self) -> Option<&str> {
        self.destination.as_deref()
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn state(&self, action: Action) -> Option<&ActionState> {
        self.states.get(&action)
    }

    pub fn action_progress(&self, action: Action) -> Option<Progress> {
        self.states.get(&action).map(ActionState::progress)
    }

    /// Last aggregate computed by [`Task::refresh_progress`].
    pub fn progress(&self) -> Progress {
        self.progress.load()
    }

    pub fn is_terminal(&self) -> bool {
        self.progress().is_terminal()
    }

    /// Whether `action` can take new work right now.
    ///
    /// Requires every earlier action of this task to have succeeded, and the
    /// action itself to be non-terminal with something left to start: a
    /// `New` unit, or (for unit-less stages) not evaluated yet.
    pub fn is_ready(&self, action: Action) -> bool {
        let Some(pos) = self.actions.iter().position(|a| *a == action) else {
            return false;
        };

        let upstream_done = self.actions[..pos]
            .iter()
            .all(|a| self.action_progress(*a) == Some(Progress::Succeeded));
        if !upstream_done {
            return false;
        }

        let Some(state) = self.states.get(&action) else {
            return false;
        };
        if state.progress().is_terminal() {
            return false;
        }

        if state.has_units() {
            state.has_new_units()
        } else {
            state.progress() == Progress::New
        }
    }

    /// Re-derive every action aggregate from live unit state, then the task
    /// aggregate from those.
    pub fn refresh_progress(&self) -> Progress {
        let progress = Progress::aggregate(
            self.actions
                .iter()
                .filter_map(|a| self.states.get(a))
                .map(ActionState::refresh),
        );
        self.progress.store(progress);
        progress
    }

    pub(crate) fn start_unit(&self, action: Action, unit: &str) -> Result<Option<UnitHandle>> {
        let state = self.require_state(action)?;
        Ok(state.start_unit(&self.name, unit))
    }

    pub(crate) fn set_action_progress(&self, action: Action, progress: Progress) -> Result<()> {
        self.require_state(action)?.set_progress(progress);
        Ok(())
    }

    /// Reconstruct this task as already finished (recorded by a previous run).
    pub(crate) fn mark_succeeded(&self) {
        for state in self.states.values() {
            state.mark_succeeded();
        }
        self.progress.store(Progress::Succeeded);
    }

    fn require_state(&self, action: Action) -> Result<&ActionState> {
        self.states
            .get(&action)
            .ok_or_else(|| CarrierError::UnknownAction {
                task: self.name.clone(),
                action: action.to_string(),
            })
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            name: self.name.clone(),
            progress: self.progress(),
            actions: self
                .actions
                .iter()
                .filter_map(|a| self.action_progress(*a).map(|p| (*a, p)))
                .collect(),
        }
    }
}

/// Point-in-time view of a task, used for the per-tick progress report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSnapshot {
    pub name: TaskName,
    pub progress: Progress,
    pub actions: Vec<(Action, Progress)>,
}

impl TaskSnapshot {
    /// `db.t:RUNNING--> create_table(SUCCEEDED) load_data(RUNNING)`
    pub fn render(&self, colored: bool) -> String {
        let paint = |p: Progress| if colored { p.colored() } else { p.to_string() };

        let mut line = format!("{}:{}-->", self.name, paint(self.progress));
        for (action, progress) in &self.actions {
            let _ = write!(line, " {}({})", action, paint(*progress));
        }
        line
    }
}
