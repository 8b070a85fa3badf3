//! Merging bins from several tile specs into one feature set.

use std::collections::BTreeMap;

use geo::Polygon;
use serde::Serialize;

use cube_common::{BinAddress, TileSpec};

use crate::bins::BinRecord;

/// Property name holding the bin address string.
pub const ID_PROPERTY: &str = "id";

/// A feature property value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    String(String),
    Number(f64),
}

/// One bin polygon with the values every contributing spec published for it.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedFeature {
    pub address: BinAddress,
    /// Bin boundary in lon/lat.
    pub geometry: Polygon<f64>,
    pub properties: BTreeMap<String, PropertyValue>,
}

impl MergedFeature {
    fn new(address: BinAddress) -> Self {
        let mut properties = BTreeMap::new();
        properties.insert(
            ID_PROPERTY.to_string(),
            PropertyValue::String(address.key()),
        );
        Self {
            address,
            geometry: address.latlon_bounds().to_polygon(),
            properties,
        }
    }

    pub fn number(&self, property: &str) -> Option<f64> {
        match self.properties.get(property) {
            Some(PropertyValue::Number(value)) => Some(*value),
            _ => None,
        }
    }
}

/// Merged features keyed by bin address string.
pub type MergedTile = BTreeMap<String, MergedFeature>;

/// Union the bins of every spec into one map keyed by address.
///
/// Specs touching the same address add their own `value_prop` to the
/// shared feature. Writing the same property twice keeps the last value.
pub fn merge<'a, I>(contributions: I) -> MergedTile
where
    I: IntoIterator<Item = (&'a TileSpec, &'a [BinRecord])>,
{
    let mut features = MergedTile::new();

    for (spec, bins) in contributions {
        for bin in bins {
            features
                .entry(bin.address.key())
                .or_insert_with(|| MergedFeature::new(bin.address))
                .properties
                .insert(spec.value_prop.clone(), PropertyValue::Number(bin.value));
        }
    }

    features
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(value_prop: &str) -> TileSpec {
        TileSpec {
            data_id: "cube".into(),
            run_id: "run".into(),
            feature: value_prop.into(),
            value_prop: value_prop.into(),
            timestamp: 0,
        }
    }

    fn bin(z: u32, x: u32, y: u32, value: f64) -> BinRecord {
        BinRecord::new(BinAddress::new(z, x, y), value)
    }

    #[test]
    fn test_union_of_addresses() {
        let yield_spec = spec("yield");
        let rain_spec = spec("rainfall");
        let yield_bins = vec![bin(4, 0, 0, 1.0), bin(4, 1, 0, 2.0)];
        let rain_bins = vec![bin(4, 1, 0, 20.0), bin(4, 1, 1, 30.0)];

        let merged = merge([
            (&yield_spec, yield_bins.as_slice()),
            (&rain_spec, rain_bins.as_slice()),
        ]);

        assert_eq!(merged.len(), 3);

        let only_yield = &merged["4/0/0"];
        assert_eq!(only_yield.number("yield"), Some(1.0));
        assert_eq!(only_yield.number("rainfall"), None);

        let both = &merged["4/1/0"];
        assert_eq!(both.number("yield"), Some(2.0));
        assert_eq!(both.number("rainfall"), Some(20.0));
        assert_eq!(
            both.properties.get(ID_PROPERTY),
            Some(&PropertyValue::String("4/1/0".into()))
        );

        let only_rain = &merged["4/1/1"];
        assert_eq!(only_rain.properties.len(), 2);
    }

    #[test]
    fn test_merge_is_commutative_in_spec_order() {
        let a = spec("a");
        let b = spec("b");
        let a_bins = vec![bin(3, 0, 0, 1.0), bin(3, 0, 1, 2.0)];
        let b_bins = vec![bin(3, 0, 1, 5.0), bin(3, 7, 7, 6.0)];

        let ab = merge([(&a, a_bins.as_slice()), (&b, b_bins.as_slice())]);
        let ba = merge([(&b, b_bins.as_slice()), (&a, a_bins.as_slice())]);
        assert_eq!(ab, ba);
    }

    #[test]
    fn test_same_property_last_write_wins() {
        let a = spec("a");
        let first = vec![bin(1, 0, 0, 1.0)];
        let second = vec![bin(1, 0, 0, 9.0)];
        let merged = merge([(&a, first.as_slice()), (&a, second.as_slice())]);
        assert_eq!(merged["1/0/0"].number("a"), Some(9.0));
    }

    #[test]
    fn test_geometry_matches_address_bounds() {
        let a = spec("a");
        let bins = vec![bin(2, 1, 2, 1.0)];
        let merged = merge([(&a, bins.as_slice())]);
        let feature = &merged["2/1/2"];
        assert_eq!(feature.geometry, BinAddress::new(2, 1, 2).latlon_bounds().to_polygon());
        assert_eq!(feature.geometry.exterior().0.len(), 5);
    }
}
