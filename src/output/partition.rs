//! Hive-style partitioned output
//!
//! Records are grouped by `areaName` and written as one Parquet file per
//! partition directory, `areaName=<value>/<file>`. Files are staged in a
//! per-call directory under the local scratch root and then uploaded.

use super::schema::{file_schema, records_to_batch, PARTITION_COLUMN};
use super::writer::{write_batch_to_parquet, ParquetWriterConfig};
use crate::config::WriteMode;
use crate::error::{Error, Result, ResultExt};
use crate::flatten::FlatRecord;
use crate::storage::Storage;
use bytes::Bytes;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Directory value used for a null or empty partition key
pub const DEFAULT_PARTITION: &str = "__HIVE_DEFAULT_PARTITION__";

/// File name used in overwrite mode
pub const OVERWRITE_FILE_NAME: &str = "data.parquet";

/// Escape a partition value the way Hive does (`%XX` for reserved bytes)
pub fn escape_partition_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        let reserved = c.is_ascii_control()
            || matches!(
                c,
                '"' | '#' | '%' | '\'' | '*' | '/' | ':' | '=' | '?' | '\\' | '{' | '[' | ']' | '^'
            );
        if reserved {
            escaped.push_str(&format!("%{:02X}", c as u32));
        } else {
            escaped.push(c);
        }
    }
    escaped
}

/// Directory name of the partition holding `area_name`
pub fn partition_dir(area_name: Option<&str>) -> String {
    match area_name {
        Some(value) if !value.is_empty() => {
            format!("{PARTITION_COLUMN}={}", escape_partition_value(value))
        }
        _ => format!("{PARTITION_COLUMN}={DEFAULT_PARTITION}"),
    }
}

/// Group records by partition key, keeping input order within a group
pub fn group_by_partition(records: &[FlatRecord]) -> BTreeMap<Option<String>, Vec<FlatRecord>> {
    let mut groups: BTreeMap<Option<String>, Vec<FlatRecord>> = BTreeMap::new();
    for record in records {
        let key = record.area_name.clone().filter(|name| !name.is_empty());
        groups.entry(key).or_default().push(record.clone());
    }
    groups
}

fn is_same_file(key: &str, file_name: &str) -> bool {
    key.rsplit('/').next() == Some(file_name)
}

/// Result of writing one partition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionOutput {
    /// Partition key value (`None` for the default partition)
    pub area_name: Option<String>,
    /// Key of the written file within the output location
    pub path: String,
    /// Rows in the file
    pub rows: usize,
    /// Stale objects removed from the partition
    pub removed: usize,
}

/// Writes flat records into a partitioned dataset
#[derive(Debug, Clone)]
pub struct PartitionedWriter {
    storage: Storage,
    temp_dir: PathBuf,
    mode: WriteMode,
    parquet: ParquetWriterConfig,
}

impl PartitionedWriter {
    /// Create a writer targeting `storage`
    pub fn new(
        storage: Storage,
        temp_dir: impl AsRef<Path>,
        mode: WriteMode,
        parquet: ParquetWriterConfig,
    ) -> Self {
        Self {
            storage,
            temp_dir: temp_dir.as_ref().to_path_buf(),
            mode,
            parquet,
        }
    }

    /// File name for this run inside every partition directory
    fn file_name(&self, run_id: &str) -> String {
        match self.mode {
            WriteMode::Overwrite => OVERWRITE_FILE_NAME.to_string(),
            WriteMode::Append => format!("part-{run_id}.parquet"),
        }
    }

    /// Write every partition present in `records`
    ///
    /// Partitions absent from `records` are left untouched. Each call stages
    /// into its own `<run_id>-XXXXXX` directory under the scratch root, which
    /// is removed whether or not the write succeeds.
    pub async fn write(&self, records: &[FlatRecord], run_id: &str) -> Result<Vec<PartitionOutput>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        tokio::fs::create_dir_all(&self.temp_dir).await.map_err(|e| {
            Error::output(format!(
                "Failed to create scratch directory {}: {e}",
                self.temp_dir.display()
            ))
        })?;
        let staging = tempfile::Builder::new()
            .prefix(&format!("{run_id}-"))
            .tempdir_in(&self.temp_dir)
            .with_context(|| format!("Failed to create staging directory for run {run_id}"))?;

        let result = self.write_partitions(records, staging.path(), run_id).await;

        let staged = staging.path().display().to_string();
        if let Err(e) = staging.close() {
            warn!("Failed to remove staging directory {staged}: {e}");
        }
        result
    }

    async fn write_partitions(
        &self,
        records: &[FlatRecord],
        staging: &Path,
        run_id: &str,
    ) -> Result<Vec<PartitionOutput>> {
        let schema = file_schema();
        let file_name = self.file_name(run_id);
        let mut outputs = Vec::new();

        for (area_name, group) in group_by_partition(records) {
            let dir = partition_dir(area_name.as_deref());
            let key = format!("{dir}/{file_name}");

            let staged_dir = staging.join(&dir);
            tokio::fs::create_dir_all(&staged_dir).await?;
            let staged_file = staged_dir.join(&file_name);

            let batch = records_to_batch(&group, &schema)?;
            let rows = write_batch_to_parquet(&staged_file, &batch, &self.parquet)
                .with_context(|| format!("Failed to stage partition {dir}"))?;
            let data = tokio::fs::read(&staged_file)
                .await
                .with_context(|| format!("Failed to read staged file {}", staged_file.display()))?;

            let existing = match self.mode {
                WriteMode::Overwrite => self.storage.list(&dir).await?,
                WriteMode::Append => Vec::new(),
            };

            let path = self.storage.put(&key, Bytes::from(data), None).await?;

            // listed keys may come back re-encoded, so match on the file name
            let mut removed = 0;
            for stale in existing.iter().filter(|k| !is_same_file(k, &file_name)) {
                self.storage.delete(stale).await?;
                removed += 1;
            }

            info!("Wrote {rows} rows to {path} ({removed} stale files removed)");
            outputs.push(PartitionOutput {
                area_name,
                path,
                rows,
                removed,
            });
        }

        Ok(outputs)
    }
}
