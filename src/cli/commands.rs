//! CLI commands and argument parsing

use crate::config::WriteMode;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Weather observation ingest and flattening ETL
#[derive(Parser, Debug)]
#[command(name = "wttr-etl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Pipeline configuration file (YAML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch current observations once and land them in raw storage
    Ingest {
        /// Event time (RFC 3339); defaults to now
        #[arg(long)]
        time: Option<String>,
    },

    /// Flatten every raw document into the partitioned Parquet dataset
    Flatten {
        /// Raw document location (overrides config)
        #[arg(long)]
        source: Option<String>,

        /// Curated dataset location (overrides config)
        /// Supports: /path, s3://bucket/path, r2://bucket/path, gs://bucket/path, az://container/path
        #[arg(short, long)]
        output: Option<String>,

        /// Local staging directory (overrides config)
        #[arg(long)]
        temp_dir: Option<PathBuf>,

        /// Partition write mode (overrides config)
        #[arg(long, value_enum)]
        write_mode: Option<WriteModeArg>,
    },

    /// Show the curated dataset schema
    Schema,

    /// Validate the configuration and print the effective values
    Validate,

    /// Start HTTP server mode
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output (one message per line)
    Json,
    /// Human-readable output
    Pretty,
}

/// Partition write mode as a CLI value
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum WriteModeArg {
    /// Replace touched partitions
    Overwrite,
    /// Add a file per run
    Append,
}

impl From<WriteModeArg> for WriteMode {
    fn from(arg: WriteModeArg) -> Self {
        match arg {
            WriteModeArg::Overwrite => WriteMode::Overwrite,
            WriteModeArg::Append => WriteMode::Append,
        }
    }
}
