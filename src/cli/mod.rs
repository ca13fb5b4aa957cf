//! CLI module
//!
//! Command-line interface for running the pipeline.
//!
//! # Commands
//!
//! - `ingest` - Fetch observations once and land the raw payload
//! - `flatten` - Rebuild the partitioned Parquet dataset from raw documents
//! - `schema` - Print the curated dataset schema
//! - `validate` - Check the configuration
//! - `serve` - Start HTTP server mode

mod commands;
mod runner;
mod server;

pub use commands::{Cli, Commands, OutputFormat, WriteModeArg};
pub use runner::{parse_event_time, schema_json, Runner};
pub use server::{router, serve};
