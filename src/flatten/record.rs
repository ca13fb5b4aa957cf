//! Flat output records
//!
//! [`FlatRecord`] is the typed row of the curated dataset. It is built from a
//! [`WideRow`] by renaming and casting the mapped source columns; every
//! column not in the mapping is dropped.

use super::timestamp::TimestampPattern;
use super::unnest::WideRow;
use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::Value;

/// Source column holding the local observation time
pub const LOCAL_OBS_DATE_TIME: &str = "current_condition.localObsDateTime";

/// One row of the curated dataset
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatRecord {
    pub id: i64,
    pub local_obs_time_stamp: Option<NaiveDateTime>,
    #[serde(rename = "FeelsLikeC")]
    pub feels_like_c: Option<i32>,
    #[serde(rename = "FeelsLikeF")]
    pub feels_like_f: Option<i32>,
    #[serde(rename = "cloudcover")]
    pub cloud_cover: Option<i32>,
    pub humidity: Option<i32>,
    pub precip_inches: Option<f32>,
    #[serde(rename = "precipMM")]
    pub precip_mm: Option<f32>,
    pub pressure: Option<i32>,
    pub pressure_inches: Option<i32>,
    #[serde(rename = "temp_C")]
    pub temp_c: Option<i32>,
    #[serde(rename = "temp_F")]
    pub temp_f: Option<i32>,
    pub uv_index: Option<i32>,
    pub visibility: Option<i32>,
    pub visibility_miles: Option<i32>,
    #[serde(rename = "winddirDegree")]
    pub wind_dir_degree: Option<i32>,
    #[serde(rename = "windspeedKmph")]
    pub wind_speed_kmph: Option<i32>,
    #[serde(rename = "windspeedMiles")]
    pub wind_speed_miles: Option<i32>,
    pub area_name: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub latitude: Option<f32>,
    pub longitude: Option<f32>,
    pub population: Option<i64>,
}

impl FlatRecord {
    /// Rename and cast the columns of a wide row
    pub fn from_row(row: &WideRow, timestamps: &TimestampPattern) -> Self {
        let int = |column: &str| {
            row.get(column)
                .and_then(cast_i64)
                .and_then(|v| i32::try_from(v).ok())
        };
        let float = |column: &str| row.get(column).and_then(cast_f32);
        let string = |column: &str| row.get(column).and_then(cast_string);

        Self {
            id: row.id,
            local_obs_time_stamp: row
                .get(LOCAL_OBS_DATE_TIME)
                .and_then(Value::as_str)
                .and_then(|s| timestamps.parse(s)),
            feels_like_c: int("current_condition.FeelsLikeC"),
            feels_like_f: int("current_condition.FeelsLikeF"),
            cloud_cover: int("current_condition.cloudcover"),
            humidity: int("current_condition.humidity"),
            precip_inches: float("current_condition.precipInches"),
            precip_mm: float("current_condition.precipMM"),
            pressure: int("current_condition.pressure"),
            pressure_inches: int("current_condition.pressureInches"),
            temp_c: int("current_condition.temp_C"),
            temp_f: int("current_condition.temp_F"),
            uv_index: int("current_condition.uvIndex"),
            visibility: int("current_condition.visibility"),
            visibility_miles: int("current_condition.visibilityMiles"),
            wind_dir_degree: int("current_condition.winddirDegree"),
            wind_speed_kmph: int("current_condition.windspeedKmph"),
            wind_speed_miles: int("current_condition.windspeedMiles"),
            area_name: string("nearest_area.areaName.value"),
            region: string("nearest_area.region.value"),
            country: string("nearest_area.country.value"),
            latitude: float("nearest_area.latitude"),
            longitude: float("nearest_area.longitude"),
            population: row.get("nearest_area.population").and_then(cast_i64),
        }
    }
}

/// Cast to a 64-bit integer
///
/// Integer strings parse directly; decimal strings and floats truncate
/// toward zero. Anything else is null.
pub fn cast_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(truncate)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(truncate))
        }
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

/// Cast to a 32-bit float
#[allow(clippy::cast_possible_truncation)]
pub fn cast_f32(value: &Value) -> Option<f32> {
    let wide = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    wide.is_finite().then_some(wide as f32)
}

/// Cast to a string; numbers and booleans use their JSON text
pub fn cast_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(_) | Value::Bool(_) => Some(value.to_string()),
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn truncate(value: f64) -> Option<i64> {
    let truncated = value.trunc();
    (truncated.is_finite() && truncated >= i64::MIN as f64 && truncated <= i64::MAX as f64)
        .then_some(truncated as i64)
}
