// src/engine/tick.rs

//! Result types for a single scheduler tick.

use crate::engine::TaskName;
use crate::plan::{Action, TaskSnapshot, UnitId};

/// A unit moved from `New` to `Running` and handed to the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmittedUnit {
    pub task: TaskName,
    pub action: Action,
    pub unit: UnitId,
}

/// Why an action admitted nothing this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Saturated { in_flight: usize, ceiling: usize },
    Unconfigured,
}

/// Structured result of one scheduler tick.
///
/// Tests step the core manually and assert on these.
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    /// Every task was terminal (or there were none); nothing was scheduled.
    pub all_finished: bool,
    /// Units admitted this tick, in admission order.
    pub admitted: Vec<AdmittedUnit>,
    /// Validator verdicts given this tick.
    pub validations: Vec<(TaskName, bool)>,
    /// Unit-less stages that completed without dispatch.
    pub skipped_empty: Vec<(TaskName, Action)>,
    /// Tasks appended to the failover log this tick.
    pub newly_recorded: Vec<TaskName>,
    /// Actions that admitted nothing because of the gate.
    pub gated: Vec<(Action, SkipReason)>,
    /// Progress of every task after this tick's admissions, or the final
    /// state when `all_finished` is set.
    pub snapshot: Vec<TaskSnapshot>,
}

impl TickReport {
    pub fn admitted_for(&self, action: Action) -> usize {
        self.admitted.iter().filter(|u| u.action == action).count()
    }
}
