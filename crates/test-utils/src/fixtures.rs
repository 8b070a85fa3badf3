//! Common test fixtures for datacube tests.
//!
//! This module provides pre-defined test data that represents common
//! scenarios in tile and timeseries processing.

use bytes::Bytes;
use chrono::{TimeZone, Utc};
use serde::Serialize;

use cube_common::{
    AggregationOption, DatacubeParams, RegionValue, RegionalAdmins, TemporalResolution,
    TileSpec, TimeseriesPoint,
};
use storage::ObjectStorage;

/// Common identifiers for testing.
pub mod ids {
    pub const DATA_ID: &str = "cube-test";
    pub const RUN_ID: &str = "run-1";
    pub const POPULATION_DATA_ID: &str = "population";
    pub const POPULATION_RUN_ID: &str = "worldpop";
    pub const POPULATION_FEATURE: &str = "total_population";
}

/// Milliseconds since the epoch for midnight UTC on the given date.
///
/// # Panics
///
/// Panics on an invalid calendar date.
pub fn date_millis(year: i32, month: u32, day: u32) -> i64 {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0)
        .single()
        .unwrap_or_else(|| panic!("invalid date {}-{}-{}", year, month, day))
        .timestamp_millis()
}

/// A timeseries point at midnight UTC on the given date.
pub fn point_at(year: i32, month: u32, day: u32, value: f64) -> TimeseriesPoint {
    TimeseriesPoint::new(date_millis(year, month, day), value)
}

/// Build a level of regions from `(id, value)` pairs.
pub fn regions(values: &[(&str, f64)]) -> Vec<RegionValue> {
    values
        .iter()
        .map(|(id, value)| RegionValue::new(*id, *value))
        .collect()
}

/// A small two-country hierarchy with values at every level.
pub fn sample_admins() -> RegionalAdmins {
    RegionalAdmins {
        country: regions(&[("Ethiopia", 30.0), ("Kenya", 10.0)]),
        admin1: regions(&[("Ethiopia__Amhara", 20.0), ("Kenya__Rift Valley", 10.0)]),
        admin2: regions(&[("Ethiopia__Amhara__North Gondar", 20.0)]),
        admin3: Vec::new(),
    }
}

/// Tile spec for the test datacube.
pub fn tile_spec(feature: &str, value_prop: &str, timestamp: i64) -> TileSpec {
    TileSpec {
        data_id: ids::DATA_ID.to_string(),
        run_id: ids::RUN_ID.to_string(),
        feature: feature.to_string(),
        value_prop: value_prop.to_string(),
        timestamp,
    }
}

/// Datacube parameters for the population cube.
pub fn population_params() -> DatacubeParams {
    DatacubeParams {
        data_id: ids::POPULATION_DATA_ID.to_string(),
        run_id: ids::POPULATION_RUN_ID.to_string(),
        feature: ids::POPULATION_FEATURE.to_string(),
        temporal_resolution: TemporalResolution::Year,
        temporal_aggregation: AggregationOption::Sum,
        spatial_aggregation: AggregationOption::Sum,
    }
}

/// Store `value` as JSON under `key`.
///
/// # Panics
///
/// Panics if serialization or the write fails.
pub async fn put_json<T: Serialize>(storage: &ObjectStorage, key: &str, value: &T) {
    let body = serde_json::to_vec(value).expect("serialize fixture");
    storage
        .put(key, Bytes::from(body))
        .await
        .expect("write fixture");
}
