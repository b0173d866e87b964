use std::fmt;

use clap::ValueEnum;

/// Where the tables being migrated currently live.
///
/// - `Hive`: managed Hive tables; data is pushed by the source warehouse.
/// - `Oss`: object-storage files exposed through external tables; data is
///   pulled by the destination warehouse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum DataSource {
    Hive,
    Oss,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Hive => f.write_str("hive"),
            DataSource::Oss => f.write_str("oss"),
        }
    }
}

/// Granularity of execution units produced from the generated scripts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// One execution unit per script file (e.g. one per partition).
    Single,
    /// One execution unit per action, running every script of that action.
    #[default]
    Batch,
}
