// src/exec/script_factory.rs

//! Builds the task population from generated migration scripts.
//!
//! Expected layout under the input directory:
//!
//! ```text
//! <input>/<database>/<table>/<action>/<unit>.<ext>
//! ```
//!
//! Every `<database>/<table>` pair becomes one task. Action directories are
//! named after the action (`create_table`, `load_data`, ...). A missing
//! action directory simply yields no units for that stage.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use crate::engine::TaskName;
use crate::errors::{CarrierError, Result};
use crate::exec::backend::TaskFactory;
use crate::exec::table_mapping::TableMapping;
use crate::fs::FileSystem;
use crate::plan::{Action, ActionPlan, Task, UnitId};
use crate::types::Mode;

/// Unit id used for the single unit of an action in batch mode.
pub const BATCH_UNIT_ID: &str = "batch";

/// Key of one execution unit across the whole run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitKey {
    pub task: TaskName,
    pub action: Action,
    pub unit: UnitId,
}

impl UnitKey {
    pub fn new(task: impl Into<TaskName>, action: Action, unit: impl Into<UnitId>) -> Self {
        Self {
            task: task.into(),
            action,
            unit: unit.into(),
        }
    }
}

/// Scripts belonging to each execution unit. Shared between the factory,
/// which fills it, and the dispatcher, which reads it.
#[derive(Debug, Clone, Default)]
pub struct ScriptCatalog {
    inner: Arc<Mutex<HashMap<UnitKey, Vec<PathBuf>>>>,
}

impl ScriptCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<UnitKey, Vec<PathBuf>>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn insert(&self, key: UnitKey, scripts: Vec<PathBuf>) {
        self.lock().insert(key, scripts);
    }

    /// Scripts for a unit, in execution order.
    pub fn scripts(&self, task: &str, action: Action, unit: &str) -> Option<Vec<PathBuf>> {
        self.lock()
            .get(&UnitKey::new(task, action, unit))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[derive(Debug)]
pub struct ScriptTaskFactory {
    fs: Arc<dyn FileSystem>,
    input_dir: PathBuf,
    mapping: Option<TableMapping>,
    catalog: ScriptCatalog,
}

impl ScriptTaskFactory {
    pub fn new(fs: Arc<dyn FileSystem>, input_dir: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            input_dir: input_dir.into(),
            mapping: None,
            catalog: ScriptCatalog::new(),
        }
    }

    /// Restrict generation to mapped tables and record their destinations.
    pub fn with_mapping(mut self, mapping: TableMapping) -> Self {
        self.mapping = Some(mapping);
        self
    }

    pub fn input_dir(&self) -> &Path {
        &self.input_dir
    }

    /// Handle to the catalog filled by [`TaskFactory::generate_tasks`].
    pub fn catalog(&self) -> ScriptCatalog {
        self.catalog.clone()
    }

    /// Subdirectories of `dir` as `(name, path)`, sorted by name.
    fn subdirs(&self, dir: &Path) -> Result<Vec<(String, PathBuf)>> {
        let mut out = Vec::new();
        for path in self.fs.read_dir(dir)? {
            if !self.fs.is_dir(&path) {
                continue;
            }
            match file_name(&path) {
                Some(name) => out.push((name.to_string(), path)),
                None => warn!(path = ?path, "skipping directory with a non UTF-8 name"),
            }
        }
        Ok(out)
    }

    /// Script files of one action directory, grouped into units.
    fn units_for(&self, action_dir: &Path, mode: Mode) -> Result<BTreeMap<UnitId, Vec<PathBuf>>> {
        let mut units: BTreeMap<UnitId, Vec<PathBuf>> = BTreeMap::new();
        if !self.fs.is_dir(action_dir) {
            return Ok(units);
        }

        for path in self.fs.read_dir(action_dir)? {
            if !self.fs.is_file(&path) {
                continue;
            }
            let id = match mode {
                Mode::Batch => BATCH_UNIT_ID.to_string(),
                Mode::Single => match path.file_stem().and_then(|s| s.to_str()) {
                    Some(stem) => stem.to_string(),
                    None => {
                        warn!(path = ?path, "skipping script with a non UTF-8 name");
                        continue;
                    }
                },
            };
            units.entry(id).or_default().push(path);
        }
        Ok(units)
    }

    fn build_task(
        &self,
        name: &str,
        table_dir: &Path,
        plan: &ActionPlan,
        mode: Mode,
    ) -> Result<Task> {
        let mut seeded: BTreeMap<Action, Vec<UnitId>> = BTreeMap::new();

        for action in plan.gated_actions() {
            let units = self.units_for(&table_dir.join(action.as_str()), mode)?;
            debug!(task = %name, action = %action, units = units.len(), "collected scripts");

            let mut ids = Vec::with_capacity(units.len());
            for (id, scripts) in units {
                self.catalog
                    .insert(UnitKey::new(name, action, id.clone()), scripts);
                ids.push(id);
            }
            seeded.insert(action, ids);
        }

        let mut task = Task::from_plan(name, plan, seeded)?;
        if let Some(dst) = self
            .mapping
            .as_ref()
            .and_then(|m| m.destination(&name.to_lowercase()))
        {
            task = task.with_destination(dst);
        }
        Ok(task)
    }
}

impl TaskFactory for ScriptTaskFactory {
    fn generate_tasks(&mut self, plan: &ActionPlan, mode: Mode) -> Result<Vec<Task>> {
        if !self.fs.is_dir(&self.input_dir) {
            return Err(CarrierError::ConfigError(format!(
                "input directory {:?} does not exist or is not a directory",
                self.input_dir
            )));
        }

        let mut tasks = Vec::new();
        for (db, db_dir) in self.subdirs(&self.input_dir)? {
            for (table, table_dir) in self.subdirs(&db_dir)? {
                let name = format!("{db}.{table}");
                if let Some(mapping) = &self.mapping {
                    if !mapping.contains(&name.to_lowercase()) {
                        debug!(task = %name, "table not in mapping; skipping");
                        continue;
                    }
                }
                tasks.push(self.build_task(&name, &table_dir, plan, mode)?);
            }
        }

        if let Some(mapping) = &self.mapping {
            for (src, _) in mapping.iter() {
                if !tasks.iter().any(|t| t.name().to_lowercase() == src) {
                    warn!(table = %src, "mapped table has no generated scripts");
                }
            }
        }

        info!(
            tasks = tasks.len(),
            units = self.catalog.len(),
            source = %plan.source(),
            ?mode,
            "generated tasks from scripts"
        );
        Ok(tasks)
    }
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}
