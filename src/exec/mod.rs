// src/exec/mod.rs

//! Execution layer.
//!
//! - [`backend`] defines the `Dispatcher`, `Validator` and `TaskFactory`
//!   traits the scheduler core is written against.
//! - [`script_factory`] turns the generated script tree into tasks.
//! - [`table_mapping`] parses the source-to-destination table mapping.
//! - [`script_runner`] runs execution units as shell processes.
//! - [`validation`] compares row counts for the compare stage.

pub mod backend;
pub mod script_factory;
pub mod script_runner;
pub mod table_mapping;
pub mod validation;

pub use backend::{Dispatcher, TaskFactory, Validator};
pub use script_factory::{BATCH_UNIT_ID, ScriptCatalog, ScriptTaskFactory, UnitKey};
pub use script_runner::{RunnerCommands, ScriptDispatcher, parse_row_count, run_unit};
pub use table_mapping::TableMapping;
pub use validation::{CountValidator, RowCounts, Side};
