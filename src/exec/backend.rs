// src/exec/backend.rs

//! Seams between the scheduler core and the outside world.
//!
//! The core talks to a [`Dispatcher`] instead of spawning processes itself,
//! asks a [`Validator`] for the compare stage, and receives its population
//! from a [`TaskFactory`]. Production wiring uses the script-based
//! implementations in this module's siblings; tests swap in fakes that
//! record submissions and finish units on demand.

use crate::errors::Result;
use crate::plan::{ActionPlan, Task, UnitHandle};
use crate::types::Mode;

/// Executes admitted execution units.
///
/// `submit` must not block: the unit is already `Running` when it arrives,
/// and the implementation reports the terminal outcome later through
/// [`UnitHandle::finish`]. An `Err` is fatal for the scheduler loop.
pub trait Dispatcher: Send {
    fn submit(&mut self, unit: UnitHandle) -> Result<()>;

    /// Called once when the loop stops. Work still running belongs to
    /// failed tasks and may be abandoned.
    fn shutdown(&mut self) {}
}

/// Decides the outcome of the compare stage for one task.
pub trait Validator: Send {
    fn validate(&self, task: &Task) -> bool;
}

/// Produces the task population for a run.
pub trait TaskFactory {
    fn generate_tasks(&mut self, plan: &ActionPlan, mode: Mode) -> Result<Vec<Task>>;
}

impl<D: Dispatcher + ?Sized> Dispatcher for Box<D> {
    fn submit(&mut self, unit: UnitHandle) -> Result<()> {
        (**self).submit(unit)
    }

    fn shutdown(&mut self) {
        (**self).shutdown()
    }
}

impl<V: Validator + ?Sized> Validator for Box<V> {
    fn validate(&self, task: &Task) -> bool {
        (**self).validate(task)
    }
}
