//! Pipeline configuration
//!
//! Bucket names, paths and the location query are carried in an explicit
//! [`PipelineConfig`] that is handed to the ingestor and the flattener at
//! construction. It is loaded from YAML; every field has a default matching
//! the hourly Melbourne deployment.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ============================================================================
// Top-Level Config
// ============================================================================

/// Complete pipeline configuration loaded from YAML
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Ingestor settings
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Flattener settings
    #[serde(default)]
    pub flatten: FlattenConfig,

    /// Parquet encoding settings
    #[serde(default)]
    pub parquet: ParquetConfig,
}

impl PipelineConfig {
    /// Load configuration from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read config file {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the values that cannot be expressed by the types alone
    pub fn validate(&self) -> Result<()> {
        if self.ingest.location.trim().is_empty() {
            return Err(Error::invalid_value("ingest.location", "must not be empty"));
        }
        if self.ingest.raw_bucket.trim().is_empty() {
            return Err(Error::invalid_value("ingest.raw_bucket", "must not be empty"));
        }
        if self.ingest.timeout_secs == 0 {
            return Err(Error::invalid_value(
                "ingest.timeout_secs",
                "must be greater than zero",
            ));
        }
        url::Url::parse(&self.ingest.endpoint)
            .map_err(|e| Error::invalid_value("ingest.endpoint", e.to_string()))?;

        if self.flatten.output.trim().is_empty() {
            return Err(Error::invalid_value("flatten.output", "must not be empty"));
        }
        if self.parquet.row_group_size == 0 {
            return Err(Error::invalid_value(
                "parquet.row_group_size",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Ingest
// ============================================================================

/// Settings for fetching and landing raw observations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Weather service base URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Location query appended to the endpoint path (e.g. `Melbourne+VIC`)
    #[serde(default = "default_location")]
    pub location: String,

    /// Response format query parameter
    #[serde(default = "default_format")]
    pub format: String,

    /// Bucket (or local directory) receiving raw documents
    #[serde(default = "default_raw_bucket")]
    pub raw_bucket: String,

    /// Key prefix for raw documents inside the bucket
    #[serde(default = "default_raw_prefix")]
    pub raw_prefix: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// User agent sent with the request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            location: default_location(),
            format: default_format(),
            raw_bucket: default_raw_bucket(),
            raw_prefix: default_raw_prefix(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_endpoint() -> String {
    "https://wttr.in".to_string()
}

fn default_location() -> String {
    "Melbourne+VIC".to_string()
}

fn default_format() -> String {
    "j1".to_string()
}

fn default_raw_bucket() -> String {
    "s3://wttr-in-data-ingest".to_string()
}

fn default_raw_prefix() -> String {
    "weather-data/Melbourne".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_user_agent() -> String {
    format!("wttr-etl/{}", env!("CARGO_PKG_VERSION"))
}

// ============================================================================
// Flatten
// ============================================================================

/// How partition directories are updated on rerun
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Replace the contents of every partition present in the batch
    #[default]
    Overwrite,
    /// Add a new run-specific file next to existing ones
    Append,
}

/// Encoding of raw objects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RawFormat {
    /// Decide per object: one JSON document, else JSON lines
    #[default]
    Auto,
    /// One JSON document per object
    Json,
    /// One JSON document per line
    Jsonl,
}

/// Settings for the flattening job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlattenConfig {
    /// Location of raw documents (URL or local path)
    #[serde(default = "default_source")]
    pub source: String,

    /// Location of the curated dataset (URL or local path)
    #[serde(default = "default_output")]
    pub output: String,

    /// Local scratch directory for staged Parquet files
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// Pattern of `localObsDateTime`, in `yyyy-MM-dd h:mm a` notation
    #[serde(default = "default_timestamp_format")]
    pub timestamp_format: String,

    /// Rerun discipline for partitions
    #[serde(default)]
    pub write_mode: WriteMode,

    /// Encoding of raw objects
    #[serde(default)]
    pub raw_format: RawFormat,
}

impl Default for FlattenConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            output: default_output(),
            temp_dir: default_temp_dir(),
            timestamp_format: default_timestamp_format(),
            write_mode: WriteMode::default(),
            raw_format: RawFormat::default(),
        }
    }
}

fn default_source() -> String {
    "s3://wttr-in-data-ingest/weather-data/Melbourne".to_string()
}

fn default_output() -> String {
    "s3://wttr-in-data-ingest/parquet-data".to_string()
}

fn default_temp_dir() -> PathBuf {
    std::env::temp_dir().join("wttr-etl")
}

fn default_timestamp_format() -> String {
    "yyyy-MM-dd h:mm a".to_string()
}

// ============================================================================
// Parquet
// ============================================================================

/// Compression codec for curated files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionCodec {
    #[default]
    Snappy,
    Zstd,
    Gzip,
    #[serde(rename = "none")]
    Uncompressed,
}

/// Parquet encoding settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParquetConfig {
    /// Compression codec
    #[serde(default)]
    pub compression: CompressionCodec,

    /// Maximum rows per row group
    #[serde(default = "default_row_group_size")]
    pub row_group_size: usize,
}

impl Default for ParquetConfig {
    fn default() -> Self {
        Self {
            compression: CompressionCodec::default(),
            row_group_size: default_row_group_size(),
        }
    }
}

fn default_row_group_size() -> usize {
    1024 * 1024
}
