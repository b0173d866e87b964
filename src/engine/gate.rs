// src/engine/gate.rs

//! Per-action admission ceilings.
//!
//! In-flight counts are never tracked incrementally: every tick re-counts
//! `Running` units from the live task population, so asynchronous
//! completions can't make the count drift.

use std::collections::BTreeMap;

use tracing::info;

use crate::config::ConcurrencySection;
use crate::plan::{Action, ActionPlan, Task};

/// Result of asking the gate whether an action may admit work this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The compare stage; never throttled.
    Ungated,
    /// Below the ceiling.
    Open { in_flight: usize, ceiling: usize },
    /// At or above the ceiling; skip the action for this tick.
    Saturated { in_flight: usize, ceiling: usize },
    /// No ceiling configured for a gated action.
    Unconfigured,
}

/// Admission budget for the remainder of one tick.
#[derive(Debug, Clone, Copy)]
pub struct AdmissionWindow {
    in_flight: usize,
    ceiling: Option<usize>,
}

impl AdmissionWindow {
    pub fn unbounded() -> Self {
        Self {
            in_flight: 0,
            ceiling: None,
        }
    }

    pub fn bounded(in_flight: usize, ceiling: usize) -> Self {
        Self {
            in_flight,
            ceiling: Some(ceiling),
        }
    }

    pub fn is_open(&self) -> bool {
        self.ceiling.is_none_or(|c| self.in_flight < c)
    }

    pub fn record_admitted(&mut self) {
        self.in_flight += 1;
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConcurrencyGate {
    ceilings: BTreeMap<Action, usize>,
}

impl ConcurrencyGate {
    pub fn new(ceilings: BTreeMap<Action, usize>) -> Self {
        Self { ceilings }
    }

    /// Same ceiling for every gated action of `plan`.
    pub fn uniform(plan: &ActionPlan, ceiling: usize) -> Self {
        Self {
            ceilings: plan.gated_actions().map(|a| (a, ceiling)).collect(),
        }
    }

    /// Ceilings for every gated action of `plan`: per-action override, or
    /// the section default.
    pub fn from_config(section: &ConcurrencySection, plan: &ActionPlan) -> Self {
        let ceilings: BTreeMap<Action, usize> = plan
            .gated_actions()
            .map(|a| (a, section.ceiling_for(a)))
            .collect();

        for (action, limit) in &ceilings {
            info!(action = %action, limit, "concurrency limit set");
        }

        Self { ceilings }
    }

    pub fn with_ceiling(mut self, action: Action, ceiling: usize) -> Self {
        self.ceilings.insert(action, ceiling);
        self
    }

    pub fn without(mut self, action: Action) -> Self {
        self.ceilings.remove(&action);
        self
    }

    pub fn ceiling(&self, action: Action) -> Option<usize> {
        self.ceilings.get(&action).copied()
    }

    /// Number of units of `action` currently `Running` across all tasks.
    pub fn in_flight(action: Action, tasks: &[Task]) -> usize {
        tasks
            .iter()
            .filter_map(|t| t.state(action))
            .map(|s| s.running_units())
            .sum()
    }

    pub fn admission(&self, action: Action, tasks: &[Task]) -> Admission {
        if action.is_validation() {
            return Admission::Ungated;
        }
        let Some(ceiling) = self.ceiling(action) else {
            return Admission::Unconfigured;
        };
        let in_flight = Self::in_flight(action, tasks);
        if in_flight >= ceiling {
            Admission::Saturated { in_flight, ceiling }
        } else {
            Admission::Open { in_flight, ceiling }
        }
    }
}
