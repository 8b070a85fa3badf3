//! Timeseries types and temporal resolution handling.

use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CubeError, CubeResult};

/// One timeseries sample. Timestamps are epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeseriesPoint {
    pub timestamp: i64,
    pub value: f64,
}

impl TimeseriesPoint {
    pub fn new(timestamp: i64, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Ordered by ascending timestamp.
pub type Timeseries = Vec<TimeseriesPoint>;

/// Temporal bucket a raw series was aggregated into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemporalResolution {
    Month,
    Year,
}

impl TemporalResolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Month => "month",
            Self::Year => "year",
        }
    }
}

impl FromStr for TemporalResolution {
    type Err = CubeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            _ => Err(CubeError::invalid_parameter("temporal_resolution", s)),
        }
    }
}

impl std::fmt::Display for TemporalResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Cadence of the raw (unaggregated) data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RawResolution {
    Dekad,
    Week,
    Day,
    Month,
    Annual,
    Other,
}

impl FromStr for RawResolution {
    type Err = CubeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dekad" => Ok(Self::Dekad),
            "week" | "weekly" => Ok(Self::Week),
            "day" | "daily" => Ok(Self::Day),
            "month" | "monthly" => Ok(Self::Month),
            "annual" | "year" | "yearly" => Ok(Self::Annual),
            "other" => Ok(Self::Other),
            _ => Err(CubeError::invalid_parameter("raw_resolution", s)),
        }
    }
}

/// Function used to aggregate raw values into a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationOption {
    Sum,
    Mean,
}

impl AggregationOption {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Mean => "mean",
        }
    }
}

impl FromStr for AggregationOption {
    type Err = CubeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sum" => Ok(Self::Sum),
            "mean" => Ok(Self::Mean),
            _ => Err(CubeError::invalid_parameter("aggregation", s)),
        }
    }
}

impl std::fmt::Display for AggregationOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Convert epoch milliseconds to a UTC datetime.
pub fn datetime_from_millis(millis: i64) -> CubeResult<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single().ok_or_else(|| {
        CubeError::invalid_parameter("timestamp", format!("{} is out of range", millis))
    })
}

/// Epoch milliseconds of January 1st, 00:00 UTC of `year`.
pub fn year_start_millis(year: i32) -> CubeResult<i64> {
    Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0)
        .single()
        .map(|dt| dt.timestamp_millis())
        .ok_or_else(|| CubeError::invalid_parameter("year", year.to_string()))
}
