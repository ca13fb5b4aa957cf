//! Tests for output module

use super::*;
use crate::config::{CompressionCodec, ParquetConfig, WriteMode};
use crate::flatten::FlatRecord;
use crate::storage::Storage;
use arrow::array::{Array, Float32Array, Int32Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, TimeUnit};
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use chrono::NaiveDate;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::Compression;
use pretty_assertions::assert_eq;
use tempfile::tempdir;
use test_case::test_case;

fn record(id: i64, area_name: Option<&str>) -> FlatRecord {
    FlatRecord {
        id,
        local_obs_time_stamp: NaiveDate::from_ymd_opt(2023, 6, 15)
            .and_then(|d| d.and_hms_opt(15, 45, 0)),
        feels_like_c: Some(19),
        feels_like_f: Some(66),
        cloud_cover: Some(75),
        humidity: Some(60),
        precip_inches: Some(0.0),
        precip_mm: Some(0.1),
        pressure: Some(1015),
        pressure_inches: Some(30),
        temp_c: Some(21),
        temp_f: Some(70),
        uv_index: Some(4),
        visibility: Some(10),
        visibility_miles: Some(6),
        wind_dir_degree: Some(200),
        wind_speed_kmph: Some(15),
        wind_speed_miles: Some(9),
        area_name: area_name.map(str::to_string),
        region: Some("Victoria".to_string()),
        country: Some("Australia".to_string()),
        latitude: Some(-37.817),
        longitude: Some(144.967),
        population: Some(4_529_500),
    }
}

fn read_parquet(data: Bytes) -> RecordBatch {
    let reader = ParquetRecordBatchReaderBuilder::try_new(data)
        .unwrap()
        .build()
        .unwrap();
    let batches: Vec<RecordBatch> = reader.map(|b| b.unwrap()).collect();
    assert_eq!(batches.len(), 1);
    batches.into_iter().next().unwrap()
}

// ============================================================================
// Schema Tests
// ============================================================================

#[test]
fn test_output_schema_columns() {
    let schema = output_schema();
    let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
    assert_eq!(
        names,
        vec![
            "id",
            "localObsTimeStamp",
            "FeelsLikeC",
            "FeelsLikeF",
            "cloudcover",
            "humidity",
            "precipInches",
            "precipMM",
            "pressure",
            "pressureInches",
            "temp_C",
            "temp_F",
            "uvIndex",
            "visibility",
            "visibilityMiles",
            "winddirDegree",
            "windspeedKmph",
            "windspeedMiles",
            "areaName",
            "region",
            "country",
            "latitude",
            "longitude",
            "population",
        ]
    );
    assert!(schema.fields().iter().all(|f| f.is_nullable()));
}

#[test_case("id", DataType::Int64)]
#[test_case("localObsTimeStamp", DataType::Timestamp(TimeUnit::Microsecond, None))]
#[test_case("temp_C", DataType::Int32)]
#[test_case("precipMM", DataType::Float32)]
#[test_case("latitude", DataType::Float32)]
#[test_case("population", DataType::Int64)]
#[test_case("country", DataType::Utf8)]
fn test_output_schema_types(column: &str, expected: DataType) {
    let schema = output_schema();
    assert_eq!(schema.field_with_name(column).unwrap().data_type(), &expected);
}

#[test]
fn test_file_schema_excludes_partition_column() {
    let schema = file_schema();
    assert_eq!(schema.fields().len(), output_schema().fields().len() - 1);
    assert!(schema.field_with_name(PARTITION_COLUMN).is_err());
}

#[test]
fn test_records_to_batch() {
    let mut sparse = record(2, None);
    sparse.temp_c = None;
    sparse.local_obs_time_stamp = None;
    let records = vec![record(1, Some("Melbourne")), sparse];

    let batch = records_to_batch(&records, &output_schema()).unwrap();
    assert_eq!(batch.num_rows(), 2);
    assert_eq!(batch.num_columns(), 24);

    let ids = batch
        .column_by_name("id")
        .unwrap()
        .as_any()
        .downcast_ref::<Int64Array>()
        .unwrap();
    assert_eq!(ids.value(0), 1);
    assert_eq!(ids.value(1), 2);

    let temps = batch
        .column_by_name("temp_C")
        .unwrap()
        .as_any()
        .downcast_ref::<Int32Array>()
        .unwrap();
    assert_eq!(temps.value(0), 21);
    assert!(temps.is_null(1));

    let areas = batch
        .column_by_name("areaName")
        .unwrap()
        .as_any()
        .downcast_ref::<StringArray>()
        .unwrap();
    assert_eq!(areas.value(0), "Melbourne");
    assert!(areas.is_null(1));

    let timestamps = batch.column_by_name("localObsTimeStamp").unwrap();
    assert!(!timestamps.is_null(0));
    assert!(timestamps.is_null(1));
}

#[test]
fn test_records_to_batch_empty() {
    let batch = records_to_batch(&[], &file_schema()).unwrap();
    assert_eq!(batch.num_rows(), 0);
    assert_eq!(batch.num_columns(), 23);
}

// ============================================================================
// Partition Naming Tests
// ============================================================================

#[test_case("Melbourne", "Melbourne"; "plain")]
#[test_case("Port Phillip", "Port Phillip"; "space kept")]
#[test_case("a/b", "a%2Fb"; "slash")]
#[test_case("x=y", "x%3Dy"; "equals")]
#[test_case("50%", "50%25"; "percent")]
fn test_escape_partition_value(input: &str, expected: &str) {
    assert_eq!(escape_partition_value(input), expected);
}

#[test]
fn test_partition_dir() {
    assert_eq!(partition_dir(Some("Melbourne")), "areaName=Melbourne");
    assert_eq!(
        partition_dir(None),
        format!("areaName={DEFAULT_PARTITION}")
    );
    assert_eq!(partition_dir(Some("")), partition_dir(None));
}

#[test]
fn test_group_by_partition() {
    let records = vec![
        record(1, Some("Melbourne")),
        record(2, Some("Sydney")),
        record(3, Some("Melbourne")),
        record(4, None),
        record(5, Some("")),
    ];

    let groups = group_by_partition(&records);
    assert_eq!(groups.len(), 3);

    let melbourne: Vec<i64> = groups[&Some("Melbourne".to_string())]
        .iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(melbourne, vec![1, 3]);

    let default: Vec<i64> = groups[&None].iter().map(|r| r.id).collect();
    assert_eq!(default, vec![4, 5]);
}

// ============================================================================
// Parquet Writer Tests
// ============================================================================

#[test_case(CompressionCodec::Snappy, Compression::SNAPPY; "snappy")]
#[test_case(CompressionCodec::Zstd, Compression::ZSTD(Default::default()); "zstd")]
#[test_case(CompressionCodec::Gzip, Compression::GZIP(Default::default()); "gzip")]
#[test_case(CompressionCodec::Uncompressed, Compression::UNCOMPRESSED; "none")]
fn test_parquet_compression(codec: CompressionCodec, expected: Compression) {
    assert_eq!(parquet_compression(codec), expected);
}

#[test]
fn test_writer_config_from_parquet_config() {
    let config = ParquetConfig {
        compression: CompressionCodec::Uncompressed,
        row_group_size: 500,
    };
    let writer = ParquetWriterConfig::from(&config);
    assert_eq!(writer.row_group_size(), 500);
    assert_eq!(writer.compression(), Compression::UNCOMPRESSED);

    let default = ParquetWriterConfig::default();
    assert_eq!(default.compression(), Compression::SNAPPY);
    assert_eq!(default.row_group_size(), 1024 * 1024);
}

#[test]
fn test_write_batch_to_parquet() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("out.parquet");

    let records = vec![record(1, Some("Melbourne")), record(2, Some("Melbourne"))];
    let batch = records_to_batch(&records, &file_schema()).unwrap();
    let rows = write_batch_to_parquet(&path, &batch, &ParquetWriterConfig::default()).unwrap();
    assert_eq!(rows, 2);

    let data = Bytes::from(std::fs::read(&path).unwrap());
    let read = read_parquet(data);
    assert_eq!(read.num_rows(), 2);
    assert_eq!(read.schema(), file_schema());

    let latitudes = read
        .column_by_name("latitude")
        .unwrap()
        .as_any()
        .downcast_ref::<Float32Array>()
        .unwrap();
    assert!((latitudes.value(0) - (-37.817)).abs() < f32::EPSILON);
}

#[test]
fn test_write_batch_uses_configured_codec_and_row_groups() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("zstd.parquet");
    let config = ParquetWriterConfig::from(&ParquetConfig {
        compression: CompressionCodec::Zstd,
        row_group_size: 2,
    });

    let records: Vec<FlatRecord> = (1..=5).map(|id| record(id, None)).collect();
    let batch = records_to_batch(&records, &file_schema()).unwrap();
    assert_eq!(write_batch_to_parquet(&path, &batch, &config).unwrap(), 5);

    let data = Bytes::from(std::fs::read(&path).unwrap());
    let builder = ParquetRecordBatchReaderBuilder::try_new(data).unwrap();
    let metadata = builder.metadata();
    assert_eq!(metadata.num_row_groups(), 3);
    assert!(matches!(
        metadata.row_group(0).column(0).compression(),
        Compression::ZSTD(_)
    ));
    assert_eq!(
        metadata.file_metadata().created_by(),
        Some(concat!("wttr-etl ", env!("CARGO_PKG_VERSION")))
    );
}

// ============================================================================
// Partitioned Writer Tests
// ============================================================================

fn partitioned_writer(storage: Storage, temp: &std::path::Path, mode: WriteMode) -> PartitionedWriter {
    PartitionedWriter::new(storage, temp, mode, ParquetWriterConfig::default())
}

#[tokio::test]
async fn test_partitioned_write_layout() {
    let temp = tempdir().unwrap();
    let storage = Storage::in_memory("curated");
    let writer = partitioned_writer(storage.clone(), temp.path(), WriteMode::Overwrite);

    let records = vec![
        record(1, Some("Melbourne")),
        record(2, Some("Sydney")),
        record(3, None),
    ];
    let outputs = writer.write(&records, "run-1").await.unwrap();
    assert_eq!(outputs.len(), 3);

    let keys = storage.list("").await.unwrap();
    assert_eq!(
        keys,
        vec![
            "areaName=Melbourne/data.parquet".to_string(),
            "areaName=Sydney/data.parquet".to_string(),
            format!("areaName={DEFAULT_PARTITION}/data.parquet"),
        ]
    );

    let melbourne = read_parquet(storage.get("areaName=Melbourne/data.parquet").await.unwrap());
    assert_eq!(melbourne.num_rows(), 1);
    assert!(melbourne.column_by_name(PARTITION_COLUMN).is_none());

    // staging directory is cleaned up
    assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_concurrent_writes_with_same_run_id() {
    let temp = tempdir().unwrap();
    let storage = Storage::in_memory("curated");
    let writer = partitioned_writer(storage.clone(), temp.path(), WriteMode::Overwrite);

    let melbourne = vec![record(1, Some("Melbourne")), record(2, Some("Melbourne"))];
    let sydney = vec![record(3, Some("Sydney"))];
    let (first, second) = tokio::join!(
        writer.write(&melbourne, "20230615T050000000Z"),
        writer.write(&sydney, "20230615T050000000Z"),
    );

    assert_eq!(first.unwrap()[0].rows, 2);
    assert_eq!(second.unwrap()[0].rows, 1);
    assert_eq!(storage.list("").await.unwrap().len(), 2);
    assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_overwrite_replaces_only_touched_partitions() {
    let temp = tempdir().unwrap();
    let storage = Storage::in_memory("curated");
    let writer = partitioned_writer(storage.clone(), temp.path(), WriteMode::Overwrite);

    writer
        .write(
            &[record(1, Some("Melbourne")), record(2, Some("Sydney"))],
            "run-1",
        )
        .await
        .unwrap();

    // a leftover file from an earlier append run
    storage
        .put("areaName=Melbourne/part-old.parquet", Bytes::from_static(b"stale"), None)
        .await
        .unwrap();

    let outputs = writer
        .write(
            &[record(10, Some("Melbourne")), record(11, Some("Melbourne"))],
            "run-2",
        )
        .await
        .unwrap();
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].rows, 2);
    assert_eq!(outputs[0].removed, 1);

    assert_eq!(
        storage.list("areaName=Melbourne").await.unwrap(),
        vec!["areaName=Melbourne/data.parquet"]
    );
    let melbourne = read_parquet(storage.get("areaName=Melbourne/data.parquet").await.unwrap());
    assert_eq!(melbourne.num_rows(), 2);

    // untouched partition still holds the first run's data
    let sydney = read_parquet(storage.get("areaName=Sydney/data.parquet").await.unwrap());
    let ids = sydney
        .column_by_name("id")
        .unwrap()
        .as_any()
        .downcast_ref::<Int64Array>()
        .unwrap();
    assert_eq!(ids.value(0), 2);
}

#[tokio::test]
async fn test_append_adds_files() {
    let temp = tempdir().unwrap();
    let storage = Storage::in_memory("curated");
    let writer = partitioned_writer(storage.clone(), temp.path(), WriteMode::Append);

    writer.write(&[record(1, Some("Melbourne"))], "a").await.unwrap();
    writer.write(&[record(2, Some("Melbourne"))], "b").await.unwrap();

    assert_eq!(
        storage.list("areaName=Melbourne").await.unwrap(),
        vec![
            "areaName=Melbourne/part-a.parquet",
            "areaName=Melbourne/part-b.parquet"
        ]
    );
}

#[tokio::test]
async fn test_overwrite_is_deterministic() {
    let temp = tempdir().unwrap();
    let storage = Storage::in_memory("curated");
    let writer = partitioned_writer(storage.clone(), temp.path(), WriteMode::Overwrite);
    let records = vec![record(1, Some("Melbourne"))];

    writer.write(&records, "first").await.unwrap();
    let first = storage.get("areaName=Melbourne/data.parquet").await.unwrap();
    writer.write(&records, "second").await.unwrap();
    let second = storage.get("areaName=Melbourne/data.parquet").await.unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_partitioned_write_empty() {
    let temp = tempdir().unwrap();
    let storage = Storage::in_memory("curated");
    let writer = partitioned_writer(storage.clone(), temp.path(), WriteMode::Overwrite);

    assert!(writer.write(&[], "run").await.unwrap().is_empty());
    assert!(storage.list("").await.unwrap().is_empty());
}
