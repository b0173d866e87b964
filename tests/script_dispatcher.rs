// tests/script_dispatcher.rs
#![cfg(unix)]

use std::error::Error;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::time::Duration;

use datacarrier::engine::{ConcurrencyGate, Heartbeat, RunOutcome, RuntimeOptions, SchedulerCore};
use datacarrier::exec::{
    CountValidator, RowCounts, RunnerCommands, ScriptDispatcher, ScriptTaskFactory, Side,
    TaskFactory, parse_row_count,
};
use datacarrier::fs::RealFileSystem;
use datacarrier::plan::{Action, ActionPlan, Progress, RunnerKind};
use datacarrier::types::{DataSource, Mode};
use datacarrier_test_utils::{init_tracing, memory_failover, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn write_script(root: &Path, action: &str, name: &str, body: &str) -> TestResult {
    let dir = root.join("db").join("t").join(action);
    fs::create_dir_all(&dir)?;
    fs::write(dir.join(name), body)?;
    Ok(())
}

/// Hive layout for `db.t`; the validate scripts print the given counts.
fn hive_tree(root: &Path, load: &str, source_rows: &str, dest_rows: &str) -> TestResult {
    write_script(root, "create_table", "t.sh", "exit 0\n")?;
    write_script(root, "add_partition", "p1.sh", "echo adding p1\n")?;
    write_script(root, "load_data", "p1.sh", load)?;
    write_script(root, "validate_source", "p1.sh", &format!("echo header\necho {source_rows}\n"))?;
    write_script(root, "validate_dest", "p1.sh", &format!("echo {dest_rows}\n"))?;
    Ok(())
}

async fn run_tree(root: &Path) -> Result<(RunOutcome, RowCounts), Box<dyn Error>> {
    let plan = ActionPlan::for_source(DataSource::Hive);
    let mut factory = ScriptTaskFactory::new(Arc::new(RealFileSystem), root);
    let tasks = factory.generate_tasks(&plan, Mode::Single)?;

    let counts = RowCounts::new();
    let runners = RunnerCommands {
        source: "sh".to_string(),
        destination: "sh".to_string(),
    };
    let dispatcher = ScriptDispatcher::new(
        Handle::current(),
        plan.clone(),
        runners,
        factory.catalog(),
        counts.clone(),
    );
    let validator = CountValidator::new(counts.clone(), &plan);
    let (failover, _store) = memory_failover(&[]);

    let core = SchedulerCore::new(
        plan.clone(),
        tasks,
        ConcurrencyGate::uniform(&plan, 4),
        failover,
        dispatcher,
        validator,
    );
    let options = RuntimeOptions {
        interval: Duration::from_millis(10),
        progress_to_stdout: false,
    };
    let outcome = with_timeout(Heartbeat::new(core, options).spawn().join()).await;
    Ok((outcome, counts))
}

#[tokio::test]
async fn scripts_run_through_every_stage() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    hive_tree(dir.path(), "echo loading\n", "42", "42")?;

    let (outcome, counts) = run_tree(dir.path()).await?;

    assert!(outcome.fault.is_none(), "unexpected fault: {:?}", outcome.fault);
    assert!(outcome.is_clean());
    assert_eq!(outcome.summary.succeeded, 1);
    assert_eq!(counts.get("db.t", Side::Source, "p1"), Some(42));
    assert_eq!(counts.get("db.t", Side::Destination, "p1"), Some(42));
    Ok(())
}

#[tokio::test]
async fn row_count_mismatch_fails_the_table() -> TestResult {
    let dir = tempfile::tempdir()?;
    hive_tree(dir.path(), "echo loading\n", "42", "41")?;

    let (outcome, _counts) = run_tree(dir.path()).await?;

    assert!(outcome.fault.is_none());
    assert_eq!(outcome.summary.failed, 1);
    let snapshot = &outcome.snapshot[0];
    assert!(
        snapshot
            .actions
            .contains(&(Action::CompareResults, Progress::Failed))
    );
    Ok(())
}

#[tokio::test]
async fn failing_script_fails_its_unit() -> TestResult {
    let dir = tempfile::tempdir()?;
    hive_tree(dir.path(), "echo partial\nexit 3\n", "1", "1")?;

    let (outcome, counts) = run_tree(dir.path()).await?;

    assert!(outcome.fault.is_none());
    assert_eq!(outcome.summary.failed, 1);
    assert_eq!(counts.get("db.t", Side::Source, "p1"), None);
    Ok(())
}

#[tokio::test]
async fn unparsable_count_fails_the_validate_unit() -> TestResult {
    let dir = tempfile::tempdir()?;
    hive_tree(dir.path(), "echo loading\n", "forty-two", "42")?;

    let (outcome, counts) = run_tree(dir.path()).await?;

    assert_eq!(outcome.summary.failed, 1);
    assert_eq!(counts.get("db.t", Side::Source, "p1"), None);
    Ok(())
}

#[test]
fn row_count_is_the_last_non_empty_line() {
    assert_eq!(parse_row_count("OK\n  17 \n\n").ok(), Some(17));
    assert!(parse_row_count("").is_err());
    assert!(parse_row_count("rows: 17").is_err());
}

#[test]
fn command_line_quotes_the_script_path() {
    let runners = RunnerCommands {
        source: "hive -f".to_string(),
        destination: "odpscmd -f".to_string(),
    };
    assert_eq!(
        runners.command_line(RunnerKind::Source, Path::new("/tmp/a b.sql")),
        "hive -f '/tmp/a b.sql'"
    );
    assert_eq!(
        runners.command_line(RunnerKind::Destination, Path::new("/tmp/it's.sql")),
        r"odpscmd -f '/tmp/it'\''s.sql'"
    );
}
