// src/engine/mod.rs

//! Scheduling engine.
//!
//! - [`gate`] holds the per-action concurrency ceilings.
//! - [`failover`] records finished tasks so a restarted run can skip them.
//! - [`core`] is the synchronous tick: observe, gate, admit, validate.
//! - [`tick`] defines the structured result of a tick.
//! - [`heartbeat`] is the async loop that drives the core at a fixed
//!   interval and captures faults.

use std::time::Duration;

/// Canonical task name type: the qualified table name.
pub type TaskName = String;

/// Default pause between two ticks.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(3000);

/// Options for the heartbeat loop.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    /// Sleep between ticks; shared by every action.
    pub interval: Duration,
    /// Also print the coloured per-task report to stdout each tick.
    pub progress_to_stdout: bool,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_HEARTBEAT_INTERVAL,
            progress_to_stdout: true,
        }
    }
}

pub mod core;
pub mod failover;
pub mod gate;
pub mod heartbeat;
pub mod tick;

pub use self::core::{RunSummary, SchedulerCore};
pub use failover::{
    FailoverLog, FailoverStore, FileFailoverStore, MemoryFailoverStore, FAILOVER_FILE_NAME,
};
pub use gate::{Admission, AdmissionWindow, ConcurrencyGate};
pub use heartbeat::{Heartbeat, HeartbeatHandle, LoopState, RunOutcome};
pub use tick::{AdmittedUnit, SkipReason, TickReport};
