// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod plan;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use tokio::runtime::Handle;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{ConfigFile, resolve};
use crate::engine::{
    ConcurrencyGate, FailoverLog, FileFailoverStore, Heartbeat, RunOutcome, RuntimeOptions,
    SchedulerCore,
};
use crate::exec::{
    CountValidator, RowCounts, RunnerCommands, ScriptDispatcher, ScriptTaskFactory,
    TableMapping, TaskFactory,
};
use crate::fs::{FileSystem, RealFileSystem};
use crate::plan::{ActionPlan, Task};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - script scanning into tasks
/// - failover log, concurrency gate and script dispatcher
/// - the heartbeat loop
///
/// Returns an error if the loop stopped on a fault or any table failed.
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = resolve(args.config.as_deref())?;
    let plan = ActionPlan::for_source(args.datasource);
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);

    let mut factory = ScriptTaskFactory::new(Arc::clone(&fs), &args.input_dir);
    if let Some(path) = &args.table_mapping {
        let mapping = TableMapping::load(fs.as_ref(), path)?;
        info!(path = ?path, tables = mapping.len(), "loaded table mapping");
        factory = factory.with_mapping(mapping);
    }
    let tasks = factory.generate_tasks(&plan, args.mode)?;
    let gate = ConcurrencyGate::from_config(&cfg.concurrency, &plan);

    if args.dry_run {
        print_dry_run(&cfg, &plan, &gate, &tasks);
        return Ok(());
    }

    let failover_path = std::env::current_dir()?.join(&cfg.scheduler.failover_file);
    let failover = FailoverLog::open(Box::new(FileFailoverStore::new(
        Arc::clone(&fs),
        failover_path,
    )));

    let counts = RowCounts::new();
    let dispatcher = ScriptDispatcher::new(
        Handle::current(),
        plan.clone(),
        RunnerCommands::from(&cfg.runners),
        factory.catalog(),
        counts.clone(),
    );
    let validator = CountValidator::new(counts, &plan);

    let core = SchedulerCore::new(plan, tasks, gate, failover, dispatcher, validator);
    let options = runtime_options(&cfg);

    let outcome = Heartbeat::new(core, options).spawn().join().await;
    finish(outcome)
}

/// Heartbeat options from the `[scheduler]` section.
pub fn runtime_options(cfg: &ConfigFile) -> RuntimeOptions {
    RuntimeOptions {
        interval: Duration::from_millis(cfg.scheduler.heartbeat_interval_ms),
        progress_to_stdout: cfg.scheduler.progress_to_stdout,
    }
}

fn finish(outcome: RunOutcome) -> Result<()> {
    if let Some(fault) = outcome.fault {
        return Err(anyhow::Error::new(fault).context("scheduler loop stopped early"));
    }
    let summary = outcome.summary;
    if summary.failed > 0 {
        bail!(
            "{} of {} tables failed; finished tables are skipped on rerun",
            summary.failed,
            summary.total
        );
    }
    Ok(())
}

/// Print the plan, the ceilings and the generated tasks.
fn print_dry_run(cfg: &ConfigFile, plan: &ActionPlan, gate: &ConcurrencyGate, tasks: &[Task]) {
    println!("datacarrier dry-run");
    println!("  source = {}", plan.source());
    println!(
        "  scheduler.heartbeat_interval_ms = {}",
        cfg.scheduler.heartbeat_interval_ms
    );
    println!("  scheduler.failover_file = {}", cfg.scheduler.failover_file);
    println!("  runners.source = {}", cfg.runners.source);
    println!("  runners.destination = {}", cfg.runners.destination);
    println!();

    println!("actions ({}):", plan.actions().len());
    for &action in plan.actions() {
        match gate.ceiling(action) {
            Some(ceiling) => println!("  - {action} (ceiling {ceiling})"),
            None => println!("  - {action}"),
        }
    }
    println!();

    println!("tasks ({}):", tasks.len());
    for task in tasks {
        match task.destination() {
            Some(dst) => println!("  - {} -> {dst}", task.name()),
            None => println!("  - {}", task.name()),
        }
        for &action in task.actions() {
            if let Some(state) = task.state(action) {
                if state.has_units() {
                    let ids: Vec<&str> = state.units().map(|u| u.id()).collect();
                    println!("      {action}: {}", ids.join(", "));
                }
            }
        }
    }

    debug!("dry-run complete (no execution)");
}
