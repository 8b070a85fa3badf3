//! Correction of partially covered trailing buckets.
//!
//! A summed series whose raw data stops part way through the final bucket
//! under-reports that bucket. The corrector estimates how much of the final
//! bucket the raw data covers and then drops, rescales or keeps the last
//! point.

use chrono::{DateTime, Datelike, Utc};
use tracing::debug;

use cube_common::time::datetime_from_millis;
use cube_common::{AggregationOption, CubeResult, RawResolution, TemporalResolution, TimeseriesPoint};

/// Below this coverage the trailing point is dropped.
pub const DROP_BELOW: f64 = 0.25;

/// Below this coverage (and at or above `DROP_BELOW`) the trailing point is
/// rescaled to a full bucket.
pub const RESCALE_BELOW: f64 = 0.9;

/// What `correct` did to the trailing point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Correction {
    Unchanged,
    Dropped,
    Rescaled { coverage: f64 },
}

/// Dekad of the month (1..=3) for a day of month.
fn dekad_of(day: u32) -> u32 {
    ((day - 1) / 10 + 1).min(3)
}

/// Week of the month (1..=4) for a day of month.
fn week_of(day: u32) -> u32 {
    ((day - 1) / 7 + 1).min(4)
}

/// Fraction of the bucket containing `last` that raw data at `raw_res`
/// has elapsed through.
///
/// Uses fixed calendar approximations (12 months, 36 dekads, 52 weeks,
/// 365 days per year; 3 dekads, 4 weeks, 30 days per month), so the result
/// can exceed 1.0. It is not clamped.
pub fn coverage(agg_res: TemporalResolution, raw_res: RawResolution, last: DateTime<Utc>) -> f64 {
    let month = last.month() as f64;
    let day = last.day();

    match (agg_res, raw_res) {
        (_, RawResolution::Other) | (_, RawResolution::Annual) => 1.0,
        (TemporalResolution::Month, RawResolution::Month) => 1.0,

        (TemporalResolution::Year, RawResolution::Month) => month / 12.0,
        (TemporalResolution::Year, RawResolution::Dekad) => {
            ((month - 1.0) * 3.0 + dekad_of(day) as f64) / 36.0
        }
        (TemporalResolution::Year, RawResolution::Week) => {
            ((month - 1.0) * 4.0 + week_of(day) as f64) / 52.0
        }
        (TemporalResolution::Year, RawResolution::Day) => last.ordinal() as f64 / 365.0,

        (TemporalResolution::Month, RawResolution::Dekad) => dekad_of(day) as f64 / 3.0,
        (TemporalResolution::Month, RawResolution::Week) => week_of(day) as f64 / 4.0,
        (TemporalResolution::Month, RawResolution::Day) => day as f64 / 30.0,
    }
}

/// Apply the coverage policy to a copy of `series`.
///
/// Only `Sum` aggregations are corrected, and only the last point may
/// change. An empty series, or one starting after `raw_last_timestamp`,
/// comes back unchanged.
pub fn correct(
    series: &[TimeseriesPoint],
    agg_option: AggregationOption,
    agg_res: TemporalResolution,
    raw_res: RawResolution,
    raw_last_timestamp: i64,
) -> CubeResult<Vec<TimeseriesPoint>> {
    let (corrected, _) = correct_with_outcome(series, agg_option, agg_res, raw_res, raw_last_timestamp)?;
    Ok(corrected)
}

/// Like `correct`, also reporting what happened to the trailing point.
pub fn correct_with_outcome(
    series: &[TimeseriesPoint],
    agg_option: AggregationOption,
    agg_res: TemporalResolution,
    raw_res: RawResolution,
    raw_last_timestamp: i64,
) -> CubeResult<(Vec<TimeseriesPoint>, Correction)> {
    let mut out = series.to_vec();

    if agg_option != AggregationOption::Sum {
        return Ok((out, Correction::Unchanged));
    }
    match series.first() {
        None => return Ok((out, Correction::Unchanged)),
        Some(first) if first.timestamp > raw_last_timestamp => {
            return Ok((out, Correction::Unchanged));
        }
        Some(_) => {}
    }

    let last = datetime_from_millis(raw_last_timestamp)?;
    let coverage = coverage(agg_res, raw_res, last);

    let outcome = if coverage < DROP_BELOW {
        out.pop();
        Correction::Dropped
    } else if coverage < RESCALE_BELOW {
        if let Some(point) = out.last_mut() {
            point.value /= coverage;
        }
        Correction::Rescaled { coverage }
    } else {
        Correction::Unchanged
    };

    debug!(
        agg_res = %agg_res,
        raw_res = ?raw_res,
        coverage,
        outcome = ?outcome,
        "Applied coverage correction"
    );

    Ok((out, outcome))
}
