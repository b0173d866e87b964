// src/exec/validation.rs

//! Row-count comparison for the compare stage.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use crate::engine::TaskName;
use crate::exec::backend::Validator;
use crate::plan::{Action, ActionPlan, Task, UnitId};

/// Which side of the migration a count was taken on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Source,
    Destination,
}

impl Side {
    /// The side a validate stage measures.
    pub fn of(action: Action) -> Option<Side> {
        match action {
            Action::ValidateSource => Some(Side::Source),
            Action::ValidateDest => Some(Side::Destination),
            _ => None,
        }
    }

    fn action(self) -> Action {
        match self {
            Side::Source => Action::ValidateSource,
            Side::Destination => Action::ValidateDest,
        }
    }
}

type CountKey = (TaskName, Side, UnitId);

/// Row counts reported by the validate stages, shared between the
/// dispatcher (writer) and the validator (reader).
#[derive(Debug, Clone, Default)]
pub struct RowCounts {
    inner: Arc<Mutex<HashMap<CountKey, u64>>>,
}

impl RowCounts {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CountKey, u64>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn record(&self, task: &str, side: Side, unit: &str, count: u64) {
        debug!(task = %task, ?side, unit = %unit, count, "row count recorded");
        self.lock()
            .insert((task.to_string(), side, unit.to_string()), count);
    }

    pub fn get(&self, task: &str, side: Side, unit: &str) -> Option<u64> {
        self.lock()
            .get(&(task.to_string(), side, unit.to_string()))
            .copied()
    }
}

/// Passes a task when every validated unit reports the same row count on
/// both sides.
///
/// Plans without a source-side validate stage (OSS) have nothing to compare
/// against and always pass. In plans that do compare, a task without any
/// validate units fails.
#[derive(Debug, Clone)]
pub struct CountValidator {
    counts: RowCounts,
    compares: bool,
}

impl CountValidator {
    pub fn new(counts: RowCounts, plan: &ActionPlan) -> Self {
        Self {
            counts,
            compares: plan.contains(Action::ValidateSource) && plan.contains(Action::ValidateDest),
        }
    }

    pub fn counts(&self) -> &RowCounts {
        &self.counts
    }
}

impl Validator for CountValidator {
    fn validate(&self, task: &Task) -> bool {
        if !self.compares {
            debug!(task = %task.name(), "no source counts in this plan; validation passes");
            return true;
        }

        let unit_ids: BTreeSet<&str> = [Side::Source, Side::Destination]
            .into_iter()
            .filter_map(|side| task.state(side.action()))
            .flat_map(|state| state.units().map(|u| u.id()))
            .collect();

        if unit_ids.is_empty() {
            warn!(task = %task.name(), "no validate units; nothing to compare row counts against");
            return false;
        }

        let mut passed = true;
        for unit in unit_ids {
            let src = self.counts.get(task.name(), Side::Source, unit);
            let dst = self.counts.get(task.name(), Side::Destination, unit);
            match (src, dst) {
                (Some(s), Some(d)) if s == d => {
                    debug!(task = %task.name(), unit = %unit, rows = s, "row counts match");
                }
                _ => {
                    warn!(
                        task = %task.name(),
                        unit = %unit,
                        source = ?src,
                        destination = ?dst,
                        "row count mismatch"
                    );
                    passed = false;
                }
            }
        }
        passed
    }
}
