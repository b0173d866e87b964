// src/exec/script_runner.rs

//! Runs execution units as shell processes.
//!
//! Each admitted unit becomes one tokio task that runs the unit's scripts
//! one after another through the configured runner command
//! (`sh -c "<runner> <script>"`). The first failing script fails the unit.
//! For validate stages the last non-empty stdout line is read as a row
//! count and stored in [`RowCounts`].

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{Context, anyhow};
use tokio::process::Command;
use tokio::runtime::Handle;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::RunnerSection;
use crate::errors::{CarrierError, Result};
use crate::exec::backend::Dispatcher;
use crate::exec::script_factory::ScriptCatalog;
use crate::exec::validation::{RowCounts, Side};
use crate::plan::{ActionPlan, RunnerKind, UnitHandle};

/// Command prefixes for each runner kind. The quoted script path is
/// appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerCommands {
    pub source: String,
    pub destination: String,
}

impl RunnerCommands {
    pub fn prefix(&self, kind: RunnerKind) -> &str {
        match kind {
            RunnerKind::Source => &self.source,
            RunnerKind::Destination => &self.destination,
        }
    }

    /// Full shell command line for one script.
    pub fn command_line(&self, kind: RunnerKind, script: &Path) -> String {
        format!(
            "{} {}",
            self.prefix(kind),
            shell_quote(&script.to_string_lossy())
        )
    }
}

impl From<&RunnerSection> for RunnerCommands {
    fn from(section: &RunnerSection) -> Self {
        Self {
            source: section.source.clone(),
            destination: section.destination.clone(),
        }
    }
}

#[derive(Debug)]
pub struct ScriptDispatcher {
    runtime: Handle,
    plan: ActionPlan,
    runners: RunnerCommands,
    catalog: ScriptCatalog,
    counts: RowCounts,
    running: JoinSet<()>,
}

impl ScriptDispatcher {
    pub fn new(
        runtime: Handle,
        plan: ActionPlan,
        runners: RunnerCommands,
        catalog: ScriptCatalog,
        counts: RowCounts,
    ) -> Self {
        Self {
            runtime,
            plan,
            runners,
            catalog,
            counts,
            running: JoinSet::new(),
        }
    }

    pub fn counts(&self) -> &RowCounts {
        &self.counts
    }

    /// Units spawned and not yet reaped.
    pub fn in_flight(&self) -> usize {
        self.running.len()
    }

    fn reap(&mut self) {
        while let Some(res) = self.running.try_join_next() {
            if let Err(err) = res {
                if err.is_panic() {
                    error!(error = %err, "script unit panicked");
                }
            }
        }
    }
}

impl Dispatcher for ScriptDispatcher {
    fn submit(&mut self, unit: UnitHandle) -> Result<()> {
        self.reap();

        let kind = self.plan.runner_for(unit.action()).ok_or_else(|| {
            CarrierError::Dispatch(format!(
                "{} has no runner; it cannot be dispatched (task {})",
                unit.action(),
                unit.task()
            ))
        })?;
        let scripts = self
            .catalog
            .scripts(unit.task(), unit.action(), unit.unit())
            .ok_or_else(|| {
                CarrierError::Dispatch(format!(
                    "no scripts registered for {}/{}/{}",
                    unit.task(),
                    unit.action(),
                    unit.unit()
                ))
            })?;

        let runners = self.runners.clone();
        let counts = self.counts.clone();
        self.running
            .spawn_on(run_unit(unit, kind, scripts, runners, counts), &self.runtime);
        Ok(())
    }

    fn shutdown(&mut self) {
        self.reap();
        if !self.running.is_empty() {
            info!(
                remaining = self.running.len(),
                "aborting script units that are still running"
            );
        }
        self.running.abort_all();
    }
}

/// Run every script of a unit and report the outcome on its handle.
pub async fn run_unit(
    unit: UnitHandle,
    kind: RunnerKind,
    scripts: Vec<PathBuf>,
    runners: RunnerCommands,
    counts: RowCounts,
) {
    match run_unit_inner(&unit, kind, &scripts, &runners, &counts).await {
        Ok(()) => {
            info!(task = %unit.task(), action = %unit.action(), unit = %unit.unit(), "unit succeeded");
            unit.succeed();
        }
        Err(err) => {
            warn!(
                task = %unit.task(),
                action = %unit.action(),
                unit = %unit.unit(),
                error = %err,
                "unit failed"
            );
            unit.fail();
        }
    }
}

async fn run_unit_inner(
    unit: &UnitHandle,
    kind: RunnerKind,
    scripts: &[PathBuf],
    runners: &RunnerCommands,
    counts: &RowCounts,
) -> anyhow::Result<()> {
    let mut last_stdout = String::new();

    for script in scripts {
        let line = runners.command_line(kind, script);
        debug!(task = %unit.task(), action = %unit.action(), cmd = %line, "starting script");

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&line)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = cmd
            .output()
            .await
            .with_context(|| format!("spawning '{line}'"))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        for l in stderr.lines() {
            debug!(task = %unit.task(), action = %unit.action(), "stderr: {}", l);
        }

        if !output.status.success() {
            return Err(anyhow!(
                "'{}' exited with code {}",
                line,
                output.status.code().unwrap_or(-1)
            ));
        }
        last_stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    }

    if let Some(side) = Side::of(unit.action()) {
        let count = parse_row_count(&last_stdout)
            .with_context(|| format!("reading row count for {}/{}", unit.task(), unit.unit()))?;
        counts.record(unit.task(), side, unit.unit(), count);
    }
    Ok(())
}

/// The last non-empty line of `stdout`, as an integer.
pub fn parse_row_count(stdout: &str) -> anyhow::Result<u64> {
    let line = stdout
        .lines()
        .map(str::trim)
        .rfind(|l| !l.is_empty())
        .ok_or_else(|| anyhow!("no output"))?;
    line.parse::<u64>()
        .with_context(|| format!("'{line}' is not a row count"))
}

fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}
