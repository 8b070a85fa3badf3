//! Datacube identifiers used to address stored outputs.

use serde::{Deserialize, Serialize};

use crate::error::{CubeError, CubeResult};
use crate::region::AdminLevel;
use crate::tile::TileCoord;
use crate::time::{AggregationOption, TemporalResolution};

/// One data source overlaid on a tile.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileSpec {
    /// Datacube (model or indicator) identifier
    pub data_id: String,
    /// Model run identifier
    pub run_id: String,
    /// Output feature name
    pub feature: String,
    /// Property name the bin values are published under
    pub value_prop: String,
    /// Target timestamp in epoch milliseconds
    pub timestamp: i64,
}

impl TileSpec {
    /// Object store key of the bin tile for this spec at `coord`.
    ///
    /// Format: {data_id}/{run_id}/{feature}/{timestamp}-{z}-{x}-{y}.tile
    pub fn storage_key(&self, coord: &TileCoord) -> String {
        format!(
            "{}/{}/{}/{}-{}-{}-{}.tile",
            self.data_id, self.run_id, self.feature, self.timestamp, coord.z, coord.x, coord.y
        )
    }

    pub fn validate(&self) -> CubeResult<()> {
        for (param, value) in [
            ("data_id", &self.data_id),
            ("run_id", &self.run_id),
            ("feature", &self.feature),
            ("value_prop", &self.value_prop),
        ] {
            if value.is_empty() {
                return Err(CubeError::invalid_parameter(param, "must not be empty"));
            }
        }
        if self.value_prop == "id" {
            return Err(CubeError::invalid_parameter(
                "value_prop",
                "'id' is reserved for the bin address",
            ));
        }
        Ok(())
    }
}

/// Identifies a regional aggregation output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatacubeParams {
    pub data_id: String,
    pub run_id: String,
    pub feature: String,
    pub temporal_resolution: TemporalResolution,
    pub temporal_aggregation: AggregationOption,
    pub spatial_aggregation: AggregationOption,
}

impl DatacubeParams {
    /// Object key of one admin level's aggregates at `timestamp`.
    pub fn regional_key(&self, level: AdminLevel, timestamp: i64) -> String {
        format!(
            "{}/{}/{}/{}/regional/{}/aggs/{}/{}.json",
            self.data_id,
            self.run_id,
            self.temporal_resolution,
            self.feature,
            level.as_str(),
            timestamp,
            self.spatial_aggregation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> TileSpec {
        TileSpec {
            data_id: "maxhop".into(),
            run_id: "run-1".into(),
            feature: "crop_yield".into(),
            value_prop: "yield".into(),
            timestamp: 1_590_969_600_000,
        }
    }

    #[test]
    fn test_storage_key() {
        assert_eq!(
            spec().storage_key(&TileCoord::new(6, 40, 31)),
            "maxhop/run-1/crop_yield/1590969600000-6-40-31.tile"
        );
    }

    #[test]
    fn test_regional_key() {
        let params = DatacubeParams {
            data_id: "maxhop".into(),
            run_id: "run-1".into(),
            feature: "crop_yield".into(),
            temporal_resolution: TemporalResolution::Year,
            temporal_aggregation: AggregationOption::Sum,
            spatial_aggregation: AggregationOption::Mean,
        };
        assert_eq!(
            params.regional_key(AdminLevel::Admin1, 1_577_836_800_000),
            "maxhop/run-1/year/crop_yield/regional/admin1/aggs/1577836800000/mean.json"
        );
    }

    #[test]
    fn test_validate() {
        assert!(spec().validate().is_ok());

        let mut bad = spec();
        bad.feature.clear();
        assert!(bad.validate().is_err());

        let mut reserved = spec();
        reserved.value_prop = "id".into();
        assert!(reserved.validate().is_err());
    }
}
