// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::engine::FAILOVER_FILE_NAME;
use crate::plan::Action;

/// Configuration as read from TOML, before validation.
///
/// ```toml
/// [scheduler]
/// heartbeat_interval_ms = 3000
/// failover_file = "failover.out"
///
/// [concurrency]
/// default = 10
///
/// [concurrency.actions]
/// load_data = 4
///
/// [runners]
/// source = "hive -f"
/// destination = "odpscmd -f"
/// ```
///
/// Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub scheduler: SchedulerSection,

    #[serde(default)]
    pub concurrency: ConcurrencySection,

    #[serde(default)]
    pub runners: RunnerSection,
}

/// Validated configuration. Build it with `ConfigFile::try_from(raw)`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub scheduler: SchedulerSection,
    pub concurrency: ConcurrencySection,
    pub runners: RunnerSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        scheduler: SchedulerSection,
        concurrency: ConcurrencySection,
        runners: RunnerSection,
    ) -> Self {
        Self {
            scheduler,
            concurrency,
            runners,
        }
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        let raw = RawConfigFile::default();
        Self::new_unchecked(raw.scheduler, raw.concurrency, raw.runners)
    }
}

/// `[scheduler]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSection {
    /// Pause between two ticks, shared by every action.
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    /// Failover log location, relative to the working directory.
    #[serde(default = "default_failover_file")]
    pub failover_file: String,

    /// Print the coloured per-task report to stdout on every tick.
    #[serde(default = "default_true")]
    pub progress_to_stdout: bool,
}

fn default_heartbeat_interval_ms() -> u64 {
    3000
}

fn default_failover_file() -> String {
    FAILOVER_FILE_NAME.to_string()
}

fn default_true() -> bool {
    true
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            failover_file: default_failover_file(),
            progress_to_stdout: default_true(),
        }
    }
}

/// `[concurrency]` section: at most this many units of one action may run
/// at the same time across all tables.
#[derive(Debug, Clone, Deserialize)]
pub struct ConcurrencySection {
    #[serde(default = "default_ceiling")]
    pub default: usize,

    /// Per-action overrides keyed by action name (`load_data = 4`).
    #[serde(default)]
    pub actions: BTreeMap<Action, usize>,
}

fn default_ceiling() -> usize {
    10
}

impl ConcurrencySection {
    pub fn ceiling_for(&self, action: Action) -> usize {
        self.actions.get(&action).copied().unwrap_or(self.default)
    }
}

impl Default for ConcurrencySection {
    fn default() -> Self {
        Self {
            default: default_ceiling(),
            actions: BTreeMap::new(),
        }
    }
}

/// `[runners]` section: command prefixes; the script path is appended.
#[derive(Debug, Clone, Deserialize)]
pub struct RunnerSection {
    #[serde(default = "default_source_runner")]
    pub source: String,

    #[serde(default = "default_destination_runner")]
    pub destination: String,
}

fn default_source_runner() -> String {
    "hive -f".to_string()
}

fn default_destination_runner() -> String {
    "odpscmd -f".to_string()
}

impl Default for RunnerSection {
    fn default() -> Self {
        Self {
            source: default_source_runner(),
            destination: default_destination_runner(),
        }
    }
}
