//! Parquet encoding of partition files

use crate::config::{CompressionCodec, ParquetConfig};
use crate::error::{Result, ResultExt};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, GzipLevel, ZstdLevel};
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::path::Path;

/// Writer identity stamped into file footers
const CREATED_BY: &str = concat!("wttr-etl ", env!("CARGO_PKG_VERSION"));

/// Parquet codec for a configured compression
pub fn parquet_compression(codec: CompressionCodec) -> Compression {
    match codec {
        CompressionCodec::Snappy => Compression::SNAPPY,
        CompressionCodec::Zstd => Compression::ZSTD(ZstdLevel::default()),
        CompressionCodec::Gzip => Compression::GZIP(GzipLevel::default()),
        CompressionCodec::Uncompressed => Compression::UNCOMPRESSED,
    }
}

/// Encoding settings shared by every partition file of a run
#[derive(Debug, Clone)]
pub struct ParquetWriterConfig {
    compression: Compression,
    row_group_size: usize,
}

impl Default for ParquetWriterConfig {
    fn default() -> Self {
        Self::from(&ParquetConfig::default())
    }
}

impl From<&ParquetConfig> for ParquetWriterConfig {
    fn from(config: &ParquetConfig) -> Self {
        Self {
            compression: parquet_compression(config.compression),
            row_group_size: config.row_group_size.max(1),
        }
    }
}

impl ParquetWriterConfig {
    #[must_use]
    pub fn compression(&self) -> Compression {
        self.compression
    }

    #[must_use]
    pub fn row_group_size(&self) -> usize {
        self.row_group_size
    }

    /// Footer metadata is fixed so identical rows give identical bytes
    fn properties(&self) -> WriterProperties {
        WriterProperties::builder()
            .set_compression(self.compression)
            .set_max_row_group_size(self.row_group_size)
            .set_created_by(CREATED_BY.to_string())
            .build()
    }
}

/// Write `batch` as a complete Parquet file at `path`
///
/// Returns the number of rows in the file.
pub fn write_batch_to_parquet(
    path: impl AsRef<Path>,
    batch: &RecordBatch,
    config: &ParquetWriterConfig,
) -> Result<usize> {
    let path = path.as_ref();
    let file = File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(config.properties()))?;
    writer.write(batch)?;
    let footer = writer.close()?;

    Ok(usize::try_from(footer.num_rows).unwrap_or_default())
}
