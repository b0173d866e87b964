// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CarrierError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// An action sequence or task layout that breaks the catalog ordering,
    /// or a factory that did not seed units for a stage.
    #[error("Invalid action plan: {0}")]
    InvalidPlan(String),

    #[error("Task {task} has no state for action {action}")]
    UnknownAction { task: String, action: String },

    #[error("Dispatch error: {0}")]
    Dispatch(String),

    #[error("Scheduler loop panicked: {0}")]
    LoopPanicked(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, CarrierError>;
