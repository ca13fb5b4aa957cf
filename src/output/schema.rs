//! Arrow schema of the curated dataset and record batch construction

use crate::error::{Error, Result};
use crate::flatten::FlatRecord;
use arrow::array::{
    ArrayRef, Float32Array, Int32Array, Int64Array, StringArray, TimestampMicrosecondArray,
};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use arrow::record_batch::RecordBatch;
use std::sync::Arc;

/// Column the dataset is partitioned by
pub const PARTITION_COLUMN: &str = "areaName";

/// Output columns in order, with their Arrow types
const OUTPUT_COLUMNS: &[(&str, DataType)] = &[
    ("id", DataType::Int64),
    (
        "localObsTimeStamp",
        DataType::Timestamp(TimeUnit::Microsecond, None),
    ),
    ("FeelsLikeC", DataType::Int32),
    ("FeelsLikeF", DataType::Int32),
    ("cloudcover", DataType::Int32),
    ("humidity", DataType::Int32),
    ("precipInches", DataType::Float32),
    ("precipMM", DataType::Float32),
    ("pressure", DataType::Int32),
    ("pressureInches", DataType::Int32),
    ("temp_C", DataType::Int32),
    ("temp_F", DataType::Int32),
    ("uvIndex", DataType::Int32),
    ("visibility", DataType::Int32),
    ("visibilityMiles", DataType::Int32),
    ("winddirDegree", DataType::Int32),
    ("windspeedKmph", DataType::Int32),
    ("windspeedMiles", DataType::Int32),
    ("areaName", DataType::Utf8),
    ("region", DataType::Utf8),
    ("country", DataType::Utf8),
    ("latitude", DataType::Float32),
    ("longitude", DataType::Float32),
    ("population", DataType::Int64),
];

/// Full schema of the curated dataset, all columns nullable
pub fn output_schema() -> SchemaRef {
    let fields: Vec<Field> = OUTPUT_COLUMNS
        .iter()
        .map(|(name, dtype)| Field::new(*name, dtype.clone(), true))
        .collect();
    Arc::new(Schema::new(fields))
}

/// Schema of the files inside a partition directory
///
/// The partition column lives in the directory name, not in the file.
pub fn file_schema() -> SchemaRef {
    let fields: Vec<Field> = OUTPUT_COLUMNS
        .iter()
        .filter(|(name, _)| *name != PARTITION_COLUMN)
        .map(|(name, dtype)| Field::new(*name, dtype.clone(), true))
        .collect();
    Arc::new(Schema::new(fields))
}

/// Convert flat records into a RecordBatch with the given schema
///
/// The schema must be [`output_schema`] or a subset of its columns.
pub fn records_to_batch(records: &[FlatRecord], schema: &SchemaRef) -> Result<RecordBatch> {
    let columns = schema
        .fields()
        .iter()
        .map(|field| build_column(field.name(), records))
        .collect::<Result<Vec<_>>>()?;

    Ok(RecordBatch::try_new(Arc::clone(schema), columns)?)
}

fn int32(records: &[FlatRecord], f: impl Fn(&FlatRecord) -> Option<i32>) -> ArrayRef {
    Arc::new(records.iter().map(f).collect::<Int32Array>())
}

fn float32(records: &[FlatRecord], f: impl Fn(&FlatRecord) -> Option<f32>) -> ArrayRef {
    Arc::new(records.iter().map(f).collect::<Float32Array>())
}

fn utf8<'a>(records: &'a [FlatRecord], f: impl Fn(&'a FlatRecord) -> Option<&'a str>) -> ArrayRef {
    Arc::new(records.iter().map(f).collect::<StringArray>())
}

/// Build the Arrow array for one output column
fn build_column(name: &str, records: &[FlatRecord]) -> Result<ArrayRef> {
    let array: ArrayRef = match name {
        "id" => Arc::new(records.iter().map(|r| Some(r.id)).collect::<Int64Array>()),
        "localObsTimeStamp" => Arc::new(
            records
                .iter()
                .map(|r| r.local_obs_time_stamp.map(|ts| ts.and_utc().timestamp_micros()))
                .collect::<TimestampMicrosecondArray>(),
        ),
        "FeelsLikeC" => int32(records, |r| r.feels_like_c),
        "FeelsLikeF" => int32(records, |r| r.feels_like_f),
        "cloudcover" => int32(records, |r| r.cloud_cover),
        "humidity" => int32(records, |r| r.humidity),
        "precipInches" => float32(records, |r| r.precip_inches),
        "precipMM" => float32(records, |r| r.precip_mm),
        "pressure" => int32(records, |r| r.pressure),
        "pressureInches" => int32(records, |r| r.pressure_inches),
        "temp_C" => int32(records, |r| r.temp_c),
        "temp_F" => int32(records, |r| r.temp_f),
        "uvIndex" => int32(records, |r| r.uv_index),
        "visibility" => int32(records, |r| r.visibility),
        "visibilityMiles" => int32(records, |r| r.visibility_miles),
        "winddirDegree" => int32(records, |r| r.wind_dir_degree),
        "windspeedKmph" => int32(records, |r| r.wind_speed_kmph),
        "windspeedMiles" => int32(records, |r| r.wind_speed_miles),
        "areaName" => utf8(records, |r| r.area_name.as_deref()),
        "region" => utf8(records, |r| r.region.as_deref()),
        "country" => utf8(records, |r| r.country.as_deref()),
        "latitude" => float32(records, |r| r.latitude),
        "longitude" => float32(records, |r| r.longitude),
        "population" => Arc::new(records.iter().map(|r| r.population).collect::<Int64Array>()),
        other => {
            return Err(Error::output(format!("Unknown output column '{other}'")));
        }
    };
    Ok(array)
}
