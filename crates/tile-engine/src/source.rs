//! Bin tile sources.

use async_trait::async_trait;
use tracing::instrument;

use cube_common::{CubeError, CubeResult, TileCoord, TileSpec};
use storage::ObjectStorage;

use crate::bins::{decode_bin_tile, BinRecord};

/// Something that can fetch the decoded bins of one stored tile.
#[async_trait]
pub trait BinTileSource: Send + Sync {
    /// Fetch and decode the bins stored for `spec` at `coord`.
    ///
    /// A missing tile must be reported with a NotFound-kind error.
    async fn fetch_bin_tile(&self, spec: &TileSpec, coord: TileCoord) -> CubeResult<Vec<BinRecord>>;
}

/// Reads bin tiles from object storage.
pub struct ObjectStoreBinSource {
    storage: ObjectStorage,
}

impl ObjectStoreBinSource {
    pub fn new(storage: ObjectStorage) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl BinTileSource for ObjectStoreBinSource {
    #[instrument(skip(self, spec, coord), fields(feature = %spec.feature, tile = %coord))]
    async fn fetch_bin_tile(&self, spec: &TileSpec, coord: TileCoord) -> CubeResult<Vec<BinRecord>> {
        let key = spec.storage_key(&coord);
        let payload = self.storage.get(&key).await.map_err(|e| match e {
            CubeError::ObjectNotFound(_) => CubeError::TileNotFound(key.clone()),
            e => e,
        })?;

        decode_bin_tile(&payload, coord)
    }
}
