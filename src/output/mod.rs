//! Output module
//!
//! Turns flat records into the curated dataset.
//!
//! # Overview
//!
//! This module provides:
//! - The fixed Arrow schema of the curated dataset
//! - Conversion of flat records to Arrow RecordBatches
//! - Parquet file writing
//! - Hive-style partitioned writes to any [`Storage`](crate::storage::Storage)

mod partition;
mod schema;
mod writer;

pub use partition::{
    escape_partition_value, group_by_partition, partition_dir, PartitionOutput,
    PartitionedWriter, DEFAULT_PARTITION, OVERWRITE_FILE_NAME,
};
pub use schema::{file_schema, output_schema, records_to_batch, PARTITION_COLUMN};
pub use writer::{parquet_compression, write_batch_to_parquet, ParquetWriterConfig};

#[cfg(test)]
mod tests;
