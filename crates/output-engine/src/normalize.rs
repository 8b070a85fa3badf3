//! Min-max normalization of regional values.

use std::collections::BTreeMap;

use cube_common::{QualifierAdmins, QualifierRegionValue, RegionValue, RegionalAdmins};

/// Scale `values` into `[0, 1]` with `(v - min) / (max - min)`.
///
/// When every value is equal the result is all 0 for zeros and all 1
/// otherwise.
pub fn normalize(values: &[f64]) -> Vec<f64> {
    let Some((min, max)) = min_max(values) else {
        return Vec::new();
    };

    if min == max {
        let fill = if min == 0.0 { 0.0 } else { 1.0 };
        return vec![fill; values.len()];
    }

    let range = max - min;
    values.iter().map(|v| (v - min) / range).collect()
}

fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    let first = *values.first()?;
    Some(
        values
            .iter()
            .fold((first, first), |(min, max), &v| (min.min(v), max.max(v))),
    )
}

/// Normalize one level of regions, keeping ids and order.
pub fn normalize_regions(regions: &[RegionValue]) -> Vec<RegionValue> {
    let values: Vec<f64> = regions.iter().map(|r| r.value).collect();
    regions
        .iter()
        .zip(normalize(&values))
        .map(|(region, value)| RegionValue::new(region.id.clone(), value))
        .collect()
}

/// Normalize each admin level independently.
pub fn normalize_regional(admins: &RegionalAdmins) -> RegionalAdmins {
    admins.map_levels(normalize_regions)
}

/// Normalize every qualifier key across the regions of one level.
///
/// Regions without a key are left without it and take no part in that
/// key's range.
pub fn normalize_qualifier_level(regions: &[QualifierRegionValue]) -> Vec<QualifierRegionValue> {
    let mut by_key: BTreeMap<&str, Vec<(usize, f64)>> = BTreeMap::new();
    for (index, region) in regions.iter().enumerate() {
        for (key, value) in &region.values {
            by_key.entry(key.as_str()).or_default().push((index, *value));
        }
    }

    let mut out: Vec<QualifierRegionValue> = regions
        .iter()
        .map(|region| QualifierRegionValue {
            id: region.id.clone(),
            values: BTreeMap::new(),
        })
        .collect();

    for (key, entries) in by_key {
        let values: Vec<f64> = entries.iter().map(|(_, v)| *v).collect();
        for ((index, _), normalized) in entries.iter().zip(normalize(&values)) {
            out[*index].values.insert(key.to_string(), normalized);
        }
    }

    out
}

/// Normalize a qualifier breakdown per level and per qualifier key.
pub fn normalize_qualifier(admins: &QualifierAdmins) -> QualifierAdmins {
    admins.map_levels(normalize_qualifier_level)
}
