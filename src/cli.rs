// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::types::{DataSource, Mode};

/// Command-line arguments for `datacarrier`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "datacarrier",
    version,
    about = "Run generated table-migration scripts under per-stage concurrency limits.",
    long_about = None
)]
pub struct CliArgs {
    /// Directory holding the generated scripts
    /// (`<dir>/<database>/<table>/<action>/<unit>.sql`).
    #[arg(short = 'i', long, value_name = "DIR")]
    pub input_dir: PathBuf,

    /// Where the tables currently live.
    #[arg(short = 'd', long, value_enum, default_value = "hive")]
    pub datasource: DataSource,

    /// One execution unit per script (`single`) or per stage (`batch`).
    #[arg(short = 'm', long, value_enum, default_value = "batch")]
    pub mode: Mode,

    /// Optional `src_db.src_table:dst_project.dst_table` mapping file.
    /// When given, only mapped tables are migrated.
    #[arg(short = 't', long, value_name = "PATH")]
    pub table_mapping: Option<PathBuf>,

    /// Path to the config file (TOML).
    ///
    /// Default: `datacarrier.toml` in the current working directory if it
    /// exists, built-in defaults otherwise.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `DATACARRIER_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Validate config, scan scripts and print the tasks, but don't run
    /// anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
