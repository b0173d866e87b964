// src/engine/core.rs

//! Synchronous scheduler core.
//!
//! One call to [`SchedulerCore::tick`] is one heartbeat: observe the live
//! task population, then walk the plan's actions in order and admit ready
//! work through the concurrency gate. Nothing here sleeps, awaits or owns a
//! runtime; the async loop lives in [`crate::engine::heartbeat`].

use tracing::{debug, info, warn};

use crate::engine::failover::FailoverLog;
use crate::engine::gate::{Admission, AdmissionWindow, ConcurrencyGate};
use crate::engine::tick::{AdmittedUnit, SkipReason, TickReport};
use crate::errors::{CarrierError, Result};
use crate::exec::{Dispatcher, Validator};
use crate::plan::{Action, ActionPlan, Progress, Task, TaskSnapshot};

/// Final tally of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Tasks skipped because a previous run had already finished them.
    pub resumed: usize,
}

#[derive(Debug)]
pub struct SchedulerCore<D, V> {
    plan: ActionPlan,
    tasks: Vec<Task>,
    gate: ConcurrencyGate,
    failover: FailoverLog,
    dispatcher: D,
    validator: V,
    resumed: usize,
}

impl<D: Dispatcher, V: Validator> SchedulerCore<D, V> {
    /// Tasks already present in the failover log are reconstructed as
    /// succeeded and never scheduled.
    pub fn new(
        plan: ActionPlan,
        tasks: Vec<Task>,
        gate: ConcurrencyGate,
        failover: FailoverLog,
        dispatcher: D,
        validator: V,
    ) -> Self {
        let mut resumed = 0;
        for task in &tasks {
            if failover.is_finished(task.name()) {
                info!(task = %task.name(), "task finished in a previous run; skipping");
                task.mark_succeeded();
                resumed += 1;
            }
        }

        Self {
            plan,
            tasks,
            gate,
            failover,
            dispatcher,
            validator,
            resumed,
        }
    }

    pub fn plan(&self) -> &ActionPlan {
        &self.plan
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, name: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.name() == name)
    }

    pub fn gate(&self) -> &ConcurrencyGate {
        &self.gate
    }

    pub fn failover(&self) -> &FailoverLog {
        &self.failover
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut D {
        &mut self.dispatcher
    }

    pub fn validator(&self) -> &V {
        &self.validator
    }

    /// Refresh every task from live unit state and record newly observed
    /// successes into `report`. Returns `true` if every task is terminal (or
    /// there are none).
    pub fn observe(&mut self, report: &mut TickReport) -> bool {
        let mut all_terminal = true;
        for task in &self.tasks {
            record_if_succeeded(&mut self.failover, task, report);
            all_terminal &= task.progress().is_terminal();
        }
        all_terminal
    }

    /// One heartbeat.
    pub fn tick(&mut self) -> Result<TickReport> {
        let mut report = TickReport::default();
        if self.observe(&mut report) {
            if self.tasks.is_empty() {
                info!("no tasks to be scheduled");
            }
            report.all_finished = true;
            report.snapshot = self.snapshot();
            return Ok(report);
        }

        let actions = self.plan.actions().to_vec();
        for action in actions {
            self.schedule_action(action, &mut report)?;
        }
        report.snapshot = self.snapshot();
        Ok(report)
    }

    /// Admit ready work for a single action.
    pub fn schedule_action(&mut self, action: Action, report: &mut TickReport) -> Result<()> {
        let mut window = match self.gate.admission(action, &self.tasks) {
            Admission::Ungated => AdmissionWindow::unbounded(),
            Admission::Open { in_flight, ceiling } => {
                debug!(action = %action, in_flight, ceiling, "action open for admission");
                AdmissionWindow::bounded(in_flight, ceiling)
            }
            Admission::Saturated { in_flight, ceiling } => {
                debug!(action = %action, in_flight, ceiling, "action at concurrency limit; skipping this tick");
                report
                    .gated
                    .push((action, SkipReason::Saturated { in_flight, ceiling }));
                return Ok(());
            }
            Admission::Unconfigured => {
                warn!(action = %action, "no concurrency limit configured; action will not be scheduled");
                report.gated.push((action, SkipReason::Unconfigured));
                return Ok(());
            }
        };

        for task in &self.tasks {
            task.refresh_progress();
            if !task.is_ready(action) {
                continue;
            }
            if !window.is_open() {
                debug!(
                    action = %action,
                    in_flight = window.in_flight(),
                    "concurrency limit reached mid-tick; deferring remaining tasks"
                );
                break;
            }

            debug!(task = %task.name(), action = %action, "task ready to schedule");

            if action.is_validation() {
                let passed = self.validator.validate(task);
                report.validations.push((task.name().to_string(), passed));
                if passed {
                    task.set_action_progress(action, Progress::Succeeded)?;
                } else {
                    warn!(task = %task.name(), "validation failed; marking task failed");
                    task.set_action_progress(action, Progress::Failed)?;
                }
                record_if_succeeded(&mut self.failover, task, report);
                continue;
            }

            let state = task.state(action).ok_or_else(|| CarrierError::UnknownAction {
                task: task.name().to_string(),
                action: action.to_string(),
            })?;

            if !state.has_units() {
                debug!(task = %task.name(), action = %action, "no execution units; completing stage without dispatch");
                task.set_action_progress(action, Progress::Succeeded)?;
                report.skipped_empty.push((task.name().to_string(), action));
                record_if_succeeded(&mut self.failover, task, report);
                continue;
            }

            for unit in state.new_unit_ids() {
                let Some(handle) = task.start_unit(action, &unit)? else {
                    continue;
                };
                info!(
                    task = %task.name(),
                    action = %action,
                    unit = %unit,
                    "execution unit submitted to runner"
                );
                self.dispatcher.submit(handle)?;
                window.record_admitted();
                report.admitted.push(AdmittedUnit {
                    task: task.name().to_string(),
                    action,
                    unit,
                });
            }
            record_if_succeeded(&mut self.failover, task, report);
        }

        Ok(())
    }

    pub fn snapshot(&self) -> Vec<TaskSnapshot> {
        self.tasks.iter().map(Task::snapshot).collect()
    }

    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary {
            total: self.tasks.len(),
            resumed: self.resumed,
            ..RunSummary::default()
        };
        for task in &self.tasks {
            match task.progress() {
                Progress::Succeeded => summary.succeeded += 1,
                Progress::Failed => summary.failed += 1,
                Progress::New | Progress::Running => {}
            }
        }
        summary
    }

    /// Release the executor pool.
    pub fn shutdown(&mut self) {
        self.dispatcher.shutdown();
    }
}

fn record_if_succeeded(failover: &mut FailoverLog, task: &Task, report: &mut TickReport) {
    if task.refresh_progress() == Progress::Succeeded && failover.record(task.name()) {
        info!(task = %task.name(), "task succeeded; recorded in failover log");
        report.newly_recorded.push(task.name().to_string());
    }
}
