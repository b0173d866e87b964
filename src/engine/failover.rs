// src/engine/failover.rs

//! Durable record of finished tasks, used to resume an interrupted run.
//!
//! The on-disk format is one qualified table name per line, append-only.
//! Duplicates are harmless; blank lines are ignored.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use tracing::{debug, error, info, warn};

use crate::engine::TaskName;
use crate::fs::FileSystem;

/// Well-known file name, resolved against the working directory.
pub const FAILOVER_FILE_NAME: &str = "failover.out";

/// Abstract storage for finished task names.
pub trait FailoverStore: Send {
    /// All recorded names, in file order, duplicates included.
    fn load(&self) -> Result<Vec<TaskName>>;
    fn append(&mut self, name: &str) -> Result<()>;
}

/// Stores names in a text file.
#[derive(Debug)]
pub struct FileFailoverStore {
    fs: Arc<dyn FileSystem>,
    path: PathBuf,
}

impl FileFailoverStore {
    pub fn new(fs: Arc<dyn FileSystem>, path: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FailoverStore for FileFailoverStore {
    fn load(&self) -> Result<Vec<TaskName>> {
        if !self.fs.exists(&self.path) {
            info!(path = ?self.path, "failover file not found; starting without failover");
            return Ok(Vec::new());
        }
        let contents = self.fs.read_to_string(&self.path)?;
        Ok(parse_lines(&contents))
    }

    fn append(&mut self, name: &str) -> Result<()> {
        self.fs.append_line(&self.path, name)
    }
}

/// Stores names in memory only. Clones share the same list.
#[derive(Debug, Clone, Default)]
pub struct MemoryFailoverStore {
    lines: Arc<Mutex<Vec<TaskName>>>,
}

impl MemoryFailoverStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TaskName>,
    {
        Self {
            lines: Arc::new(Mutex::new(lines.into_iter().map(Into::into).collect())),
        }
    }

    pub fn lines(&self) -> Vec<TaskName> {
        self.lines.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl FailoverStore for MemoryFailoverStore {
    fn load(&self) -> Result<Vec<TaskName>> {
        Ok(parse_lines(&self.lines().join("\n")))
    }

    fn append(&mut self, name: &str) -> Result<()> {
        self.lines
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(name.to_string());
        Ok(())
    }
}

fn parse_lines(contents: &str) -> Vec<TaskName> {
    contents
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Finished-set loaded at startup plus append-once recording of new
/// successes.
///
/// Store errors never escape: a failed load degrades to "no failover", a
/// failed append only loses that record.
pub struct FailoverLog {
    store: Box<dyn FailoverStore>,
    /// Names finished before this process started.
    finished: HashSet<TaskName>,
    /// Names already in the store, from either the previous run or this one.
    recorded: HashSet<TaskName>,
}

impl FailoverLog {
    pub fn open(store: Box<dyn FailoverStore>) -> Self {
        let finished: HashSet<TaskName> = match store.load() {
            Ok(names) => names.into_iter().collect(),
            Err(err) => {
                error!(error = %err, "reading failover log failed; continuing without failover");
                HashSet::new()
            }
        };

        if !finished.is_empty() {
            info!(count = finished.len(), "loaded finished tasks from failover log");
        }

        Self {
            store,
            recorded: finished.clone(),
            finished,
        }
    }

    /// Tasks recorded by a previous run.
    pub fn finished(&self) -> &HashSet<TaskName> {
        &self.finished
    }

    pub fn is_finished(&self, name: &str) -> bool {
        self.finished.contains(name)
    }

    /// Append `name` unless it was already recorded. Returns `true` only the
    /// first time a name is seen.
    pub fn record(&mut self, name: &str) -> bool {
        if !self.recorded.insert(name.to_string()) {
            debug!(task = %name, "task already recorded in failover log");
            return false;
        }
        if let Err(err) = self.store.append(name) {
            warn!(
                task = %name,
                error = %err,
                "writing failover record failed; task will be rescheduled on restart"
            );
        }
        true
    }
}

impl std::fmt::Debug for FailoverLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailoverLog")
            .field("finished", &self.finished.len())
            .field("recorded", &self.recorded.len())
            .finish_non_exhaustive()
    }
}
