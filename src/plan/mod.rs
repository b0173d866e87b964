// src/plan/mod.rs

//! Migration task model.
//!
//! - [`action`] holds the stage catalog and the per-source [`ActionPlan`].
//! - [`progress`] defines the progress enum shared by every granularity.
//! - [`action_state`] tracks one action of one task and its execution units.
//! - [`task`] ties them together with the readiness and aggregation rules.

pub mod action;
pub mod action_state;
pub mod progress;
pub mod task;

pub use action::{Action, ActionPlan, RunnerKind};
pub use action_state::{ActionState, ExecutionUnit, UnitHandle, UnitId, UnitOutcome};
pub use progress::{Progress, ProgressCell};
pub use task::{Task, TaskSnapshot};
