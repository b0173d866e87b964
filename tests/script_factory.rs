// tests/script_factory.rs

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use datacarrier::errors::CarrierError;
use datacarrier::exec::{BATCH_UNIT_ID, ScriptTaskFactory, TableMapping, TaskFactory};
use datacarrier::fs::mock::MockFileSystem;
use datacarrier::plan::{Action, ActionPlan, Task};
use datacarrier::types::{DataSource, Mode};

type TestResult = Result<(), Box<dyn Error>>;

fn sample_tree() -> MockFileSystem {
    let fs = MockFileSystem::new();
    fs.add_file("in/db1/t1/create_table/t1.sql", "create table t1;");
    fs.add_file("in/db1/t1/add_partition/p2.sql", "alter table t1 add partition (p=2);");
    fs.add_file("in/db1/t1/add_partition/p1.sql", "alter table t1 add partition (p=1);");
    fs.add_file("in/db1/t1/load_data/p1.sql", "insert p1");
    fs.add_file("in/db1/t1/load_data/p2.sql", "insert p2");
    fs.add_file("in/db1/t1/validate_source/p1.sql", "select count(*) p1");
    fs.add_file("in/db1/t1/validate_dest/p1.sql", "select count(*) p1");
    // Not part of the Hive plan; ignored.
    fs.add_file("in/db1/t1/create_external_table/t1.sql", "create external table t1;");
    fs.add_file("in/db0/t2/create_table/t2.sql", "create table t2;");
    // Stray file at the database level; ignored.
    fs.add_file("in/README", "generated");
    fs
}

fn unit_ids(task: &Task, action: Action) -> Vec<String> {
    task.state(action)
        .map(|s| s.units().map(|u| u.id().to_string()).collect())
        .unwrap_or_default()
}

#[test]
fn single_mode_yields_one_unit_per_script() -> TestResult {
    let plan = ActionPlan::for_source(DataSource::Hive);
    let mut factory = ScriptTaskFactory::new(Arc::new(sample_tree()), "in");
    let catalog = factory.catalog();

    let tasks = factory.generate_tasks(&plan, Mode::Single)?;
    let names: Vec<&str> = tasks.iter().map(Task::name).collect();
    assert_eq!(names, vec!["db0.t2", "db1.t1"]);

    let t1 = &tasks[1];
    assert_eq!(unit_ids(t1, Action::CreateTable), vec!["t1"]);
    assert_eq!(unit_ids(t1, Action::AddPartition), vec!["p1", "p2"]);
    assert_eq!(unit_ids(t1, Action::LoadData), vec!["p1", "p2"]);
    assert_eq!(unit_ids(t1, Action::ValidateSource), vec!["p1"]);
    assert!(unit_ids(t1, Action::CompareResults).is_empty());
    assert!(t1.state(Action::CreateExternalTable).is_none());

    assert_eq!(
        catalog.scripts("db1.t1", Action::AddPartition, "p2"),
        Some(vec![PathBuf::from("in/db1/t1/add_partition/p2.sql")])
    );

    let t2 = &tasks[0];
    assert_eq!(unit_ids(t2, Action::CreateTable), vec!["t2"]);
    assert!(unit_ids(t2, Action::LoadData).is_empty());
    assert_eq!(t2.destination(), None);
    Ok(())
}

#[test]
fn batch_mode_groups_scripts_into_one_unit() -> TestResult {
    let plan = ActionPlan::for_source(DataSource::Hive);
    let mut factory = ScriptTaskFactory::new(Arc::new(sample_tree()), "in");
    let catalog = factory.catalog();

    let tasks = factory.generate_tasks(&plan, Mode::Batch)?;
    let t1 = tasks.iter().find(|t| t.name() == "db1.t1").ok_or("missing db1.t1")?;

    assert_eq!(unit_ids(t1, Action::AddPartition), vec![BATCH_UNIT_ID]);
    assert_eq!(
        catalog.scripts("db1.t1", Action::AddPartition, BATCH_UNIT_ID),
        Some(vec![
            PathBuf::from("in/db1/t1/add_partition/p1.sql"),
            PathBuf::from("in/db1/t1/add_partition/p2.sql"),
        ])
    );
    Ok(())
}

#[test]
fn oss_plan_picks_up_external_table_stages() -> TestResult {
    let plan = ActionPlan::for_source(DataSource::Oss);
    let mut factory = ScriptTaskFactory::new(Arc::new(sample_tree()), "in");

    let tasks = factory.generate_tasks(&plan, Mode::Single)?;
    let t1 = tasks.iter().find(|t| t.name() == "db1.t1").ok_or("missing db1.t1")?;
    assert_eq!(unit_ids(t1, Action::CreateExternalTable), vec!["t1"]);
    assert!(t1.state(Action::ValidateSource).is_none());
    Ok(())
}

#[test]
fn mapping_restricts_tables_and_sets_destination() -> TestResult {
    let plan = ActionPlan::for_source(DataSource::Hive);
    let mapping = TableMapping::parse("# only one table\nDB1.T1:proj.t1_new\n")?;
    let mut factory =
        ScriptTaskFactory::new(Arc::new(sample_tree()), "in").with_mapping(mapping);

    let tasks = factory.generate_tasks(&plan, Mode::Batch)?;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].name(), "db1.t1");
    assert_eq!(tasks[0].destination(), Some("proj.t1_new"));
    Ok(())
}

#[test]
fn missing_input_directory_is_a_config_error() {
    let plan = ActionPlan::for_source(DataSource::Hive);
    let mut factory = ScriptTaskFactory::new(Arc::new(MockFileSystem::new()), "nowhere");
    assert!(matches!(
        factory.generate_tasks(&plan, Mode::Batch),
        Err(CarrierError::ConfigError(_))
    ));
}

#[test]
fn empty_input_directory_yields_no_tasks() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_dir("in");
    let mut factory = ScriptTaskFactory::new(Arc::new(fs), "in");
    let tasks = factory.generate_tasks(&ActionPlan::for_source(DataSource::Oss), Mode::Single)?;
    assert!(tasks.is_empty());
    Ok(())
}

#[test]
fn table_mapping_parsing() -> TestResult {
    let mapping = TableMapping::parse(
        "\n# comment\n  src.a : dst.a  \nsrc.B:dst.b\n",
    )?;
    assert_eq!(mapping.len(), 2);
    assert_eq!(mapping.destination("src.a"), Some("dst.a"));
    assert_eq!(mapping.destination("src.b"), Some("dst.b"));
    assert_eq!(mapping.destination("src.c"), None);

    for bad in ["src.a", "src:dst.a", "src.a:dst", "a.b.c:dst.x", "src.a:dst.a\nsrc.a:dst.z"] {
        assert!(
            matches!(TableMapping::parse(bad), Err(CarrierError::ConfigError(_))),
            "expected rejection of {bad:?}"
        );
    }
    Ok(())
}
