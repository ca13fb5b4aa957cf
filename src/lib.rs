// Numeric casts are range-checked where the flattener narrows values
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # wttr-etl
//!
//! Hourly weather observations from wttr.in, landed raw and flattened into a
//! partitioned Parquet dataset.
//!
//! ## Stages
//!
//! - **Ingest**: one GET against the weather service per invocation; a 200
//!   body is stored unchanged at `<raw-prefix>/<event-time>.json`
//! - **Flatten**: every raw document is unnested, recombined, cast to a fixed
//!   schema and written as Parquet partitioned by `areaName`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use wttr_etl::{Flattener, Ingestor, PipelineConfig, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = PipelineConfig::load("pipeline.yaml")?;
//!
//!     // Land the current observation
//!     let outcome = Ingestor::from_config(&config.ingest)?
//!         .run(chrono::Utc::now())
//!         .await?;
//!     println!("{}", outcome.to_response());
//!
//!     // Rebuild the curated dataset
//!     let report = Flattener::new(&config)?.run().await?;
//!     println!("{} records", report.records);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐  GET   ┌──────────┐  put   ┌───────────────────────────┐
//! │ wttr.in  │ ─────► │ Ingestor │ ─────► │ raw/<event-time>.json     │
//! └──────────┘        └──────────┘        └─────────────┬─────────────┘
//!                                                       │ list + get
//!                     ┌─────────────────────────────────┴─────────────┐
//!                     │ Flattener                                     │
//!                     │ unnest → rejoin by id → cast → Arrow → Parquet│
//!                     └─────────────────────────────────┬─────────────┘
//!                                                       │ put
//!                                     ┌─────────────────┴─────────────┐
//!                                     │ curated/areaName=<v>/*.parquet│
//!                                     └───────────────────────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]

/// Error types
pub mod error;

/// Pipeline configuration
pub mod config;

/// Single-attempt HTTP client
pub mod http;

/// Blob storage (S3, R2, GCS, Azure, local)
pub mod storage;

/// Fetching and landing raw observations
pub mod ingest;

/// Unnesting raw documents into typed rows
pub mod flatten;

/// Arrow/Parquet output and partitioned writes
pub mod output;

/// Command-line interface
pub mod cli;

pub use error::{Error, Result};

pub use config::PipelineConfig;
pub use flatten::{FlatRecord, FlattenReport, Flattener};
pub use ingest::{IngestOutcome, Ingestor};
pub use storage::Storage;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
