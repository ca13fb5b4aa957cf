//! The flattening job: read raw documents, unnest them, write the dataset

use super::document::{RawDocument, RawReader};
use super::record::FlatRecord;
use super::timestamp::TimestampPattern;
use super::unnest::{unnest_document, IdAllocator};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::output::{ParquetWriterConfig, PartitionOutput, PartitionedWriter};
use crate::storage::Storage;
use chrono::Utc;
use serde::Serialize;
use std::time::Instant;
use tracing::{info, warn};

/// A document left out of the batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    /// Object key (and line or element number) of the document
    pub source: String,
    /// Why it was left out
    pub reason: String,
}

impl Rejection {
    fn new(source: impl Into<String>, reason: impl ToString) -> Self {
        Self {
            source: source.into(),
            reason: reason.to_string(),
        }
    }
}

/// Summary of one flattening run
#[derive(Debug, Clone, Default, Serialize)]
pub struct FlattenReport {
    /// Identifier of the run (names staging directories and append files)
    pub run_id: String,
    /// Documents read from the source location
    pub documents: usize,
    /// Rows written
    pub records: usize,
    /// Documents or objects that were skipped
    pub rejections: Vec<Rejection>,
    /// Partitions written
    pub partitions: Vec<PartitionOutput>,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
}

/// Flatten a batch of documents into typed records
///
/// Every document receives its synthetic id before any nested fragment does,
/// so document ids are `1..=documents.len()` in input order. Documents with a
/// malformed shape are returned as rejections.
pub fn flatten_documents(
    documents: &[RawDocument],
    timestamps: &TimestampPattern,
) -> (Vec<FlatRecord>, Vec<Rejection>) {
    let mut ids = IdAllocator::new();
    let doc_ids: Vec<i64> = documents.iter().map(|_| ids.next_id()).collect();

    let mut records = Vec::with_capacity(documents.len());
    let mut rejections = Vec::new();

    for (doc, doc_id) in documents.iter().zip(doc_ids) {
        match unnest_document(doc_id, &doc.value, &mut ids) {
            Ok(row) => records.push(FlatRecord::from_row(&row, timestamps)),
            Err(reason) => {
                warn!("Skipping document {}: {reason}", doc.source);
                rejections.push(Rejection::new(&doc.source, reason));
            }
        }
    }

    (records, rejections)
}

/// Batch job turning raw observations into the partitioned Parquet dataset
#[derive(Debug, Clone)]
pub struct Flattener {
    reader: RawReader,
    writer: PartitionedWriter,
    timestamps: TimestampPattern,
}

impl Flattener {
    /// Create a flattener for the locations named in `config`
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        let source = Storage::parse(&config.flatten.source)?;
        let output = Storage::parse(&config.flatten.output)?;
        Self::with_storage(config, source, output)
    }

    /// Create a flattener over already-opened locations
    pub fn with_storage(config: &PipelineConfig, source: Storage, output: Storage) -> Result<Self> {
        let timestamps = TimestampPattern::new(&config.flatten.timestamp_format)?;
        let reader = RawReader::new(source, config.flatten.raw_format);
        let writer = PartitionedWriter::new(
            output,
            &config.flatten.temp_dir,
            config.flatten.write_mode,
            ParquetWriterConfig::from(&config.parquet),
        );

        Ok(Self {
            reader,
            writer,
            timestamps,
        })
    }

    /// Flatten documents without touching storage
    pub fn transform(&self, documents: &[RawDocument]) -> (Vec<FlatRecord>, Vec<Rejection>) {
        flatten_documents(documents, &self.timestamps)
    }

    /// Run the job with a fresh run id
    pub async fn run(&self) -> Result<FlattenReport> {
        let run_id = Utc::now().format("%Y%m%dT%H%M%S%3fZ").to_string();
        self.run_with_id(&run_id).await
    }

    /// Run the job
    ///
    /// Storage and encoding failures abort the run; malformed documents do
    /// not.
    pub async fn run_with_id(&self, run_id: &str) -> Result<FlattenReport> {
        let start = Instant::now();
        info!("Starting flatten run {run_id}");

        let (documents, undecodable) = self.reader.read_all().await?;

        let mut rejections: Vec<Rejection> = undecodable
            .into_iter()
            .map(|object| {
                warn!("Skipping object {}: {}", object.source, object.error);
                Rejection::new(object.source, object.error)
            })
            .collect();

        let (records, mut skipped) = self.transform(&documents);
        rejections.append(&mut skipped);

        let partitions = self.writer.write(&records, run_id).await?;

        let report = FlattenReport {
            run_id: run_id.to_string(),
            documents: documents.len(),
            records: records.len(),
            rejections,
            partitions,
            duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        };

        info!(
            "Flatten run {run_id} complete: {} documents, {} records, {} rejected, {} partitions in {}ms",
            report.documents,
            report.records,
            report.rejections.len(),
            report.partitions.len(),
            report.duration_ms
        );
        Ok(report)
    }
}
