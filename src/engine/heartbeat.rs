// src/engine/heartbeat.rs

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::engine::core::{RunSummary, SchedulerCore};
use crate::engine::tick::TickReport;
use crate::engine::RuntimeOptions;
use crate::errors::CarrierError;
use crate::exec::{Dispatcher, Validator};
use crate::plan::TaskSnapshot;

/// Heartbeat loop state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopped,
}

/// What the loop left behind when it stopped.
#[derive(Debug)]
pub struct RunOutcome {
    pub ticks: u64,
    pub summary: RunSummary,
    pub snapshot: Vec<TaskSnapshot>,
    /// Error or panic that stopped the loop early.
    pub fault: Option<CarrierError>,
}

impl RunOutcome {
    /// No fault and no failed task.
    pub fn is_clean(&self) -> bool {
        self.fault.is_none() && self.summary.failed == 0
    }
}

/// Polls the [`SchedulerCore`] at a fixed interval until every task is
/// terminal or a tick faults.
///
/// Faults are stored in [`RunOutcome::fault`] and never propagate past the
/// loop, panics included.
pub struct Heartbeat<D, V> {
    core: SchedulerCore<D, V>,
    options: RuntimeOptions,
    state: LoopState,
}

impl<D, V> fmt::Debug for Heartbeat<D, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Heartbeat")
            .field("options", &self.options)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<D: Dispatcher, V: Validator> Heartbeat<D, V> {
    pub fn new(core: SchedulerCore<D, V>, options: RuntimeOptions) -> Self {
        Self {
            core,
            options,
            state: LoopState::Running,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn core(&self) -> &SchedulerCore<D, V> {
        &self.core
    }

    /// Run the loop to completion on the current task.
    pub async fn run(mut self) -> RunOutcome {
        info!(interval = ?self.options.interval, "start scheduling tasks");

        let mut ticks = 0u64;
        let mut fault = None;

        while self.state == LoopState::Running {
            ticks += 1;
            match self.tick_guarded() {
                Ok(report) if report.all_finished => {
                    self.emit_progress(&report);
                    info!(ticks, "all tasks finished; heartbeat will stop");
                    self.state = LoopState::Stopped;
                    self.core.shutdown();
                    break;
                }
                Ok(report) => {
                    debug!(
                        ticks,
                        admitted = report.admitted.len(),
                        validated = report.validations.len(),
                        "heartbeat tick complete"
                    );
                    self.emit_progress(&report);
                }
                Err(err) => {
                    error!(ticks, error = %err, "fault on heartbeat; scheduler loop stopped");
                    self.state = LoopState::Stopped;
                    fault = Some(err);
                    break;
                }
            }

            tokio::time::sleep(self.options.interval).await;
        }

        let summary = self.core.summary();
        info!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            resumed = summary.resumed,
            "scheduler loop finished"
        );

        RunOutcome {
            ticks,
            summary,
            snapshot: self.core.snapshot(),
            fault,
        }
    }

    fn tick_guarded(&mut self) -> Result<TickReport, CarrierError> {
        let core = &mut self.core;
        match panic::catch_unwind(AssertUnwindSafe(|| core.tick())) {
            Ok(result) => result,
            Err(payload) => Err(CarrierError::LoopPanicked(panic_message(payload.as_ref()))),
        }
    }

    fn emit_progress(&self, report: &TickReport) {
        for snapshot in &report.snapshot {
            info!(target: "datacarrier::progress", "{}", snapshot.render(false));
            if self.options.progress_to_stdout {
                println!("{}", snapshot.render(true));
            }
        }
    }
}

impl<D, V> Heartbeat<D, V>
where
    D: Dispatcher + 'static,
    V: Validator + 'static,
{
    /// Run the loop on its own tokio task.
    pub fn spawn(self) -> HeartbeatHandle {
        HeartbeatHandle {
            handle: tokio::spawn(self.run()),
        }
    }
}

/// Join handle for a spawned [`Heartbeat`].
#[derive(Debug)]
pub struct HeartbeatHandle {
    handle: JoinHandle<RunOutcome>,
}

impl HeartbeatHandle {
    pub async fn join(self) -> RunOutcome {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(err) => RunOutcome {
                ticks: 0,
                summary: RunSummary::default(),
                snapshot: Vec::new(),
                fault: Some(CarrierError::LoopPanicked(err.to_string())),
            },
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
