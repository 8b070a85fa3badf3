//! Test data generators for synthetic datacube outputs.
//!
//! These generators create predictable, verifiable test data patterns
//! that can be used across the test suite.

use cube_common::{RegionValue, Timeseries, TimeseriesPoint};

/// Creates a series with one point per step.
///
/// Point `i` has timestamp `start + i * step` and value `i + 1`, so the
/// last value equals the series length.
///
/// # Example
///
/// ```
/// use test_utils::create_linear_series;
///
/// let series = create_linear_series(0, 1_000, 3);
/// assert_eq!(series.len(), 3);
/// assert_eq!(series[2].timestamp, 2_000);
/// assert_eq!(series[2].value, 3.0);
/// ```
pub fn create_linear_series(start: i64, step: i64, count: usize) -> Timeseries {
    (0..count)
        .map(|i| TimeseriesPoint::new(start + step * i as i64, (i + 1) as f64))
        .collect()
}

/// Creates `count` regions named `{prefix}-{i}` with value `i`.
pub fn create_ramp_regions(prefix: &str, count: usize) -> Vec<RegionValue> {
    (0..count)
        .map(|i| RegionValue::new(format!("{}-{}", prefix, i), i as f64))
        .collect()
}

/// Creates `count` regions that all share the same value.
pub fn create_constant_regions(prefix: &str, count: usize, value: f64) -> Vec<RegionValue> {
    (0..count)
        .map(|i| RegionValue::new(format!("{}-{}", prefix, i), value))
        .collect()
}
