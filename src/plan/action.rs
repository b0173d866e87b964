// src/plan/action.rs

//! Pipeline stages and the per-source ordering of them.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::errors::{CarrierError, Result};
use crate::types::DataSource;

/// One stage of a table migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    CreateTable,
    AddPartition,
    CreateExternalTable,
    AddExternalPartition,
    LoadData,
    ValidateSource,
    ValidateDest,
    /// Compares the row counts gathered by the validate stages. Has no
    /// execution units and no concurrency ceiling.
    CompareResults,
}

impl Action {
    /// The full catalog in pipeline order.
    pub const CATALOG: [Action; 8] = [
        Action::CreateTable,
        Action::AddPartition,
        Action::CreateExternalTable,
        Action::AddExternalPartition,
        Action::LoadData,
        Action::ValidateSource,
        Action::ValidateDest,
        Action::CompareResults,
    ];

    /// Position of this action in [`Action::CATALOG`].
    pub fn rank(self) -> usize {
        match self {
            Action::CreateTable => 0,
            Action::AddPartition => 1,
            Action::CreateExternalTable => 2,
            Action::AddExternalPartition => 3,
            Action::LoadData => 4,
            Action::ValidateSource => 5,
            Action::ValidateDest => 6,
            Action::CompareResults => 7,
        }
    }

    pub fn is_validation(self) -> bool {
        self == Action::CompareResults
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Action::CreateTable => "create_table",
            Action::AddPartition => "add_partition",
            Action::CreateExternalTable => "create_external_table",
            Action::AddExternalPartition => "add_external_partition",
            Action::LoadData => "load_data",
            Action::ValidateSource => "validate_source",
            Action::ValidateDest => "validate_dest",
            Action::CompareResults => "compare_results",
        }
    }
}

impl Ord for Action {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl PartialOrd for Action {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Action::CATALOG
            .iter()
            .copied()
            .find(|a| a.as_str() == wanted)
            .ok_or_else(|| format!("unknown action: {s}"))
    }
}

/// Which warehouse executes the scripts of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunnerKind {
    Source,
    Destination,
}

impl RunnerKind {
    /// `None` for the compare stage, which never reaches a runner.
    pub fn for_action(source: DataSource, action: Action) -> Option<RunnerKind> {
        match action {
            Action::CompareResults => None,
            Action::ValidateSource => Some(RunnerKind::Source),
            Action::LoadData => match source {
                DataSource::Hive => Some(RunnerKind::Source),
                DataSource::Oss => Some(RunnerKind::Destination),
            },
            _ => Some(RunnerKind::Destination),
        }
    }
}

/// Ordered stages applied to every table of one source kind.
///
/// The order is the dependency chain inside a task: a stage only becomes
/// ready once every earlier stage succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionPlan {
    source: DataSource,
    actions: Vec<Action>,
}

impl ActionPlan {
    /// Build a plan, rejecting empty, duplicated or out-of-order sequences.
    pub fn new(source: DataSource, actions: Vec<Action>) -> Result<Self> {
        if actions.is_empty() {
            return Err(CarrierError::InvalidPlan(format!(
                "plan for {source} has no actions"
            )));
        }
        for pair in actions.windows(2) {
            if pair[0].rank() >= pair[1].rank() {
                return Err(CarrierError::InvalidPlan(format!(
                    "plan for {source} lists {} before {}; actions must be unique and in pipeline order",
                    pair[0], pair[1]
                )));
            }
        }
        Ok(Self { source, actions })
    }

    /// The standard plan for a source kind.
    pub fn for_source(source: DataSource) -> Self {
        let actions = match source {
            DataSource::Hive => vec![
                Action::CreateTable,
                Action::AddPartition,
                Action::LoadData,
                Action::ValidateSource,
                Action::ValidateDest,
                Action::CompareResults,
            ],
            DataSource::Oss => vec![
                Action::CreateTable,
                Action::AddPartition,
                Action::CreateExternalTable,
                Action::AddExternalPartition,
                Action::LoadData,
                Action::ValidateDest,
                Action::CompareResults,
            ],
        };
        Self { source, actions }
    }

    pub fn source(&self) -> DataSource {
        self.source
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn contains(&self, action: Action) -> bool {
        self.actions.contains(&action)
    }

    /// Stages that carry execution units and are subject to a ceiling.
    pub fn gated_actions(&self) -> impl Iterator<Item = Action> + '_ {
        self.actions.iter().copied().filter(|a| !a.is_validation())
    }

    pub fn runner_for(&self, action: Action) -> Option<RunnerKind> {
        RunnerKind::for_action(self.source, action)
    }
}
