// src/exec/table_mapping.rs

//! Source-to-destination table mapping.
//!
//! One mapping per line: `src_db.src_table:dst_project.dst_table`.
//! Blank lines and lines starting with `#` are ignored.

use std::collections::BTreeMap;
use std::path::Path;

use crate::errors::{CarrierError, Result};
use crate::fs::FileSystem;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableMapping {
    entries: BTreeMap<String, String>,
}

impl TableMapping {
    pub fn parse(contents: &str) -> Result<Self> {
        let mut entries = BTreeMap::new();

        for (idx, raw) in contents.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let lineno = idx + 1;

            let (src, dst) = line.split_once(':').ok_or_else(|| {
                CarrierError::ConfigError(format!(
                    "table mapping line {lineno}: expected 'src_db.src_table:dst_project.dst_table', got '{line}'"
                ))
            })?;
            let src = qualified(src, lineno)?;
            let dst = qualified(dst, lineno)?;

            if entries.insert(src.clone(), dst).is_some() {
                return Err(CarrierError::ConfigError(format!(
                    "table mapping line {lineno}: {src} is mapped more than once"
                )));
            }
        }

        Ok(Self { entries })
    }

    pub fn load(fs: &dyn FileSystem, path: &Path) -> Result<Self> {
        let contents = fs.read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Destination for a qualified source table, if mapped.
    pub fn destination(&self, source: &str) -> Option<&str> {
        self.entries.get(source).map(String::as_str)
    }

    pub fn contains(&self, source: &str) -> bool {
        self.entries.contains_key(source)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Validate a `db.table` pair and lowercase it.
fn qualified(part: &str, lineno: usize) -> Result<String> {
    let part = part.trim();
    match part.split_once('.') {
        Some((db, table))
            if !db.is_empty() && !table.is_empty() && !table.contains('.') =>
        {
            Ok(format!("{}.{}", db.to_lowercase(), table.to_lowercase()))
        }
        _ => Err(CarrierError::ConfigError(format!(
            "table mapping line {lineno}: '{part}' is not a qualified 'database.table' name"
        ))),
    }
}
