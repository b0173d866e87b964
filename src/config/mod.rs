// src/config/mod.rs

//! Configuration loading and validation.
//!
//! - [`model`] defines the TOML-backed data model.
//! - [`loader`] reads a config file (or falls back to defaults).
//! - [`validate`] checks value ranges while converting the raw model.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, parse_str, resolve};
pub use model::{ConcurrencySection, ConfigFile, RawConfigFile, RunnerSection, SchedulerSection};
