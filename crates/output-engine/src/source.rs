//! Regional aggregation sources.

use async_trait::async_trait;
use futures::future::try_join_all;
use tracing::{debug, instrument};

use cube_common::{AdminLevel, CubeError, CubeResult, DatacubeParams, RegionValue, RegionalAdmins};
use storage::ObjectStorage;

/// Something that can fetch regional aggregates for a datacube.
#[async_trait]
pub trait RegionalAggregationSource: Send + Sync {
    /// Aggregates for every admin level at `timestamp` (epoch ms).
    async fn fetch_regional_aggregation(
        &self,
        params: &DatacubeParams,
        timestamp: i64,
    ) -> CubeResult<RegionalAdmins>;
}

/// Reads per-level JSON aggregates from object storage.
pub struct ObjectStoreRegionalSource {
    storage: ObjectStorage,
}

impl ObjectStoreRegionalSource {
    pub fn new(storage: ObjectStorage) -> Self {
        Self { storage }
    }

    async fn fetch_level(
        &self,
        params: &DatacubeParams,
        level: AdminLevel,
        timestamp: i64,
    ) -> CubeResult<Vec<RegionValue>> {
        let key = params.regional_key(level, timestamp);
        match self.storage.get(&key).await {
            Ok(body) => serde_json::from_slice(&body).map_err(|e| {
                CubeError::DecodeError(format!("{}: {}", key, e))
            }),
            Err(e) if e.is_not_found() => {
                debug!(path = %key, "No aggregates stored for level");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl RegionalAggregationSource for ObjectStoreRegionalSource {
    #[instrument(skip(self, params), fields(data_id = %params.data_id, feature = %params.feature))]
    async fn fetch_regional_aggregation(
        &self,
        params: &DatacubeParams,
        timestamp: i64,
    ) -> CubeResult<RegionalAdmins> {
        let levels = try_join_all(
            AdminLevel::ALL
                .iter()
                .map(|level| self.fetch_level(params, *level, timestamp)),
        )
        .await?;

        let mut admins = RegionalAdmins::default();
        for (level, regions) in AdminLevel::ALL.iter().zip(levels) {
            *admins.level_mut(*level) = regions;
        }
        Ok(admins)
    }
}
