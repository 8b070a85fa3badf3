//! Tile assembly service.
//!
//! The `TileService` builds one vector tile out of several tile specs:
//!
//! ```text
//! build_tile(z/x/y, specs)
//!      │
//!      ├─► fetch_bin_tile(spec) for every spec, concurrently
//!      │         │
//!      │         └─► missing tile: empty or error, per MissingTilePolicy
//!      │
//!      ├─► subdivide to max(z + bin_level, finest fetched zoom)
//!      │
//!      ├─► merge (union by bin address)
//!      │
//!      └─► encode as gzip vector tile
//! ```

use std::sync::Arc;
use std::time::Instant;

use futures::future::try_join_all;
use tracing::{debug, instrument};

use cube_common::{CubeError, CubeResult, TileCoord, TileSpec, MAX_ZOOM};

use crate::bins::BinRecord;
use crate::config::{MissingTilePolicy, TileEngineConfig};
use crate::merge::{merge, MergedTile};
use crate::vector_tile::VectorTileEncoder;
use crate::source::BinTileSource;
use crate::subdivide::{resolution_of, subdivide};

/// Bins fetched for one spec, already refined to the output resolution.
pub type Contribution = (TileSpec, Vec<BinRecord>);

/// Builds vector tiles from stored bin tiles.
pub struct TileService {
    source: Arc<dyn BinTileSource>,
    config: TileEngineConfig,
    encoder: VectorTileEncoder,
}

impl TileService {
    pub fn new(source: Arc<dyn BinTileSource>, config: TileEngineConfig) -> Self {
        let encoder = VectorTileEncoder::new(config.layer_name.clone(), config.extent);
        Self {
            source,
            config,
            encoder,
        }
    }

    pub fn config(&self) -> &TileEngineConfig {
        &self.config
    }

    /// Fetch every spec concurrently and refine the results.
    ///
    /// The first failing fetch fails the whole request; in-flight fetches
    /// for the other specs are dropped. All contributions come back at one
    /// zoom: `z + bin_level`, or the finest stored resolution if a spec was
    /// stored deeper than that.
    pub async fn fetch_contributions(
        &self,
        coord: TileCoord,
        specs: &[TileSpec],
    ) -> CubeResult<Vec<Contribution>> {
        if !coord.is_valid() {
            return Err(CubeError::invalid_parameter(
                "tile",
                format!("{} is outside the zoom {} grid", coord, coord.z),
            ));
        }
        if specs.is_empty() {
            return Err(CubeError::invalid_parameter(
                "specs",
                "at least one tile spec is required",
            ));
        }
        for spec in specs {
            spec.validate()?;
        }

        let base_zoom = coord.z + self.config.bin_level;
        if base_zoom > MAX_ZOOM {
            return Err(CubeError::invalid_parameter(
                "tile",
                format!(
                    "{} with bin level {} refines past zoom {}",
                    coord, self.config.bin_level, MAX_ZOOM
                ),
            ));
        }

        let fetches = specs.iter().map(|spec| self.fetch_one(spec, coord));
        let fetched = try_join_all(fetches).await?;

        let target_zoom = fetched
            .iter()
            .filter_map(|(_, bins)| resolution_of(bins))
            .fold(base_zoom, u32::max);
        if target_zoom > base_zoom {
            debug!(tile = %coord, base_zoom, target_zoom, "Stored bins finer than bin level");
        }

        Ok(fetched
            .into_iter()
            .map(|(spec, bins)| {
                let bins = match resolution_of(&bins) {
                    Some(from_zoom) => subdivide(bins, from_zoom, target_zoom),
                    None => bins,
                };
                (spec, bins)
            })
            .collect())
    }

    async fn fetch_one(&self, spec: &TileSpec, coord: TileCoord) -> CubeResult<Contribution> {
        let bins = match self.source.fetch_bin_tile(spec, coord).await {
            Ok(bins) => bins,
            Err(e) if e.is_not_found() => match self.config.missing_tile_policy {
                MissingTilePolicy::Empty => {
                    debug!(tile = %coord, feature = %spec.feature, "No stored tile, treating as empty");
                    metrics::counter!("tile_fetch_missing_total").increment(1);
                    Vec::new()
                }
                MissingTilePolicy::Fail => return Err(e),
            },
            Err(e) => return Err(e),
        };

        Ok((spec.clone(), bins))
    }

    /// Fetch and merge all specs into one feature map.
    pub async fn merged_tile(&self, coord: TileCoord, specs: &[TileSpec]) -> CubeResult<MergedTile> {
        let contributions = self.fetch_contributions(coord, specs).await?;
        Ok(merge(
            contributions
                .iter()
                .map(|(spec, bins)| (spec, bins.as_slice())),
        ))
    }

    /// Build the gzip-compressed vector tile for `coord`.
    #[instrument(skip(self, coord, specs), fields(tile = %coord, spec_count = specs.len()))]
    pub async fn build_tile(&self, coord: TileCoord, specs: &[TileSpec]) -> CubeResult<Vec<u8>> {
        let start = Instant::now();

        let features = self.merged_tile(coord, specs).await?;
        let bytes = self.encoder.encode(&features, coord)?;

        metrics::histogram!("tile_build_seconds").record(start.elapsed().as_secs_f64());
        metrics::counter!("tiles_served_total").increment(1);
        debug!(
            features = features.len(),
            size = bytes.len(),
            "Built vector tile"
        );

        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cube_common::BinAddress;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    /// In-memory source keyed by feature name.
    #[derive(Default)]
    struct MapSource {
        tiles: HashMap<String, CubeResult<Vec<BinRecord>>>,
        calls: AtomicUsize,
    }

    impl MapSource {
        fn with(mut self, feature: &str, result: CubeResult<Vec<BinRecord>>) -> Self {
            self.tiles.insert(feature.to_string(), result);
            self
        }
    }

    #[async_trait]
    impl BinTileSource for MapSource {
        async fn fetch_bin_tile(
            &self,
            spec: &TileSpec,
            coord: TileCoord,
        ) -> CubeResult<Vec<BinRecord>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.tiles.get(&spec.feature) {
                Some(Ok(bins)) => Ok(bins.clone()),
                Some(Err(e)) => Err(CubeError::StorageError(e.to_string())),
                None => Err(CubeError::TileNotFound(spec.storage_key(&coord))),
            }
        }
    }

    fn spec(feature: &str) -> TileSpec {
        TileSpec {
            data_id: "cube".into(),
            run_id: "run".into(),
            feature: feature.into(),
            value_prop: feature.into(),
            timestamp: 0,
        }
    }

    fn config(bin_level: u32, policy: MissingTilePolicy) -> TileEngineConfig {
        TileEngineConfig {
            bin_level,
            missing_tile_policy: policy,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_contributions_are_refined_to_bin_level() {
        let coord = TileCoord::new(2, 1, 1);
        let source = MapSource::default().with(
            "a",
            Ok(vec![BinRecord::new(BinAddress::new(3, 2, 2), 1.0)]),
        );
        let service = TileService::new(Arc::new(source), config(2, MissingTilePolicy::Empty));

        let contributions = service.fetch_contributions(coord, &[spec("a")]).await.unwrap();
        assert_eq!(contributions.len(), 1);
        assert_eq!(contributions[0].1.len(), 4);
        assert!(contributions[0].1.iter().all(|b| b.address.z == 4));
    }

    #[tokio::test]
    async fn test_missing_tile_empty_policy() {
        let coord = TileCoord::new(1, 0, 0);
        let source = MapSource::default().with(
            "a",
            Ok(vec![BinRecord::new(BinAddress::new(2, 0, 0), 1.0)]),
        );
        let service = TileService::new(Arc::new(source), config(1, MissingTilePolicy::Empty));

        let merged = service
            .merged_tile(coord, &[spec("a"), spec("missing")])
            .await
            .unwrap();
        assert_eq!(merged.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_tile_fail_policy() {
        let coord = TileCoord::new(1, 0, 0);
        let source = MapSource::default().with(
            "a",
            Ok(vec![BinRecord::new(BinAddress::new(2, 0, 0), 1.0)]),
        );
        let service = TileService::new(Arc::new(source), config(1, MissingTilePolicy::Fail));

        let err = service
            .merged_tile(coord, &[spec("a"), spec("missing")])
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_any_fetch_error_fails_request() {
        let coord = TileCoord::new(1, 0, 0);
        let source = MapSource::default()
            .with("a", Ok(vec![BinRecord::new(BinAddress::new(2, 0, 0), 1.0)]))
            .with("broken", Err(CubeError::StorageError("connection reset".into())));
        let service = TileService::new(Arc::new(source), config(1, MissingTilePolicy::Empty));

        let err = service
            .build_tile(coord, &[spec("a"), spec("broken")])
            .await
            .unwrap_err();
        assert!(matches!(err, CubeError::StorageError(_)));
    }

    #[tokio::test]
    async fn test_rejects_invalid_requests() {
        let service = TileService::new(
            Arc::new(MapSource::default()),
            config(1, MissingTilePolicy::Empty),
        );

        let err = service
            .build_tile(TileCoord::new(1, 0, 0), &[])
            .await
            .unwrap_err();
        assert_eq!(err.http_status_code(), 400);

        let err = service
            .build_tile(TileCoord::new(1, 2, 0), &[spec("a")])
            .await
            .unwrap_err();
        assert_eq!(err.http_status_code(), 400);
    }

    #[tokio::test]
    async fn test_fetches_every_spec() {
        let source = Arc::new(
            MapSource::default()
                .with("a", Ok(vec![]))
                .with("b", Ok(vec![]))
                .with("c", Ok(vec![])),
        );
        let service = TileService::new(source.clone(), config(0, MissingTilePolicy::Empty));
        service
            .build_tile(TileCoord::new(0, 0, 0), &[spec("a"), spec("b"), spec("c")])
            .await
            .unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_finer_stored_spec_raises_output_zoom() {
        let coord = TileCoord::new(1, 0, 0);
        let source = MapSource::default()
            .with("fine", Ok(vec![BinRecord::new(BinAddress::new(4, 0, 0), 1.0)]))
            .with("coarse", Ok(vec![BinRecord::new(BinAddress::new(2, 0, 0), 2.0)]));
        let service = TileService::new(Arc::new(source), config(2, MissingTilePolicy::Empty));

        let contributions = service
            .fetch_contributions(coord, &[spec("fine"), spec("coarse")])
            .await
            .unwrap();
        assert!(contributions
            .iter()
            .flat_map(|(_, bins)| bins)
            .all(|b| b.address.z == 4));
        assert_eq!(contributions[1].1.len(), 16);

        let merged = service
            .merged_tile(coord, &[spec("fine"), spec("coarse")])
            .await
            .unwrap();
        assert_eq!(merged.len(), 16);
        let shared = &merged["4/0/0"];
        assert_eq!(shared.number("fine"), Some(1.0));
        assert_eq!(shared.number("coarse"), Some(2.0));
    }

    #[tokio::test]
    async fn test_rejects_zoom_past_addressable_range() {
        let edge = (1u32 << 30) - 1;
        let coord = TileCoord::new(30, edge, 0);
        let source = MapSource::default().with(
            "a",
            Ok(vec![BinRecord::new(BinAddress::new(30, edge, 0), 1.0)]),
        );
        let service = TileService::new(Arc::new(source), TileEngineConfig::default());

        let err = service.build_tile(coord, &[spec("a")]).await.unwrap_err();
        assert_eq!(err.http_status_code(), 400);
        assert!(err.to_string().contains("refines past zoom 31"));
    }

    #[tokio::test]
    async fn test_refines_to_deepest_zoom() {
        let edge = (1u32 << 30) - 1;
        let coord = TileCoord::new(30, edge, edge);
        let source = MapSource::default().with(
            "a",
            Ok(vec![BinRecord::new(BinAddress::new(30, edge, edge), 1.0)]),
        );
        let service = TileService::new(Arc::new(source), config(1, MissingTilePolicy::Empty));

        let contributions = service.fetch_contributions(coord, &[spec("a")]).await.unwrap();
        let bins = &contributions[0].1;
        assert_eq!(bins.len(), 4);
        assert!(bins.iter().all(|b| b.address.z == MAX_ZOOM && b.address.is_valid()));
    }

    /// Sets its flag when the owning fetch future is dropped.
    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    /// One spec hangs forever, every other spec fails.
    struct StalledSource {
        dropped: Arc<AtomicBool>,
    }

    #[async_trait]
    impl BinTileSource for StalledSource {
        async fn fetch_bin_tile(
            &self,
            spec: &TileSpec,
            _coord: TileCoord,
        ) -> CubeResult<Vec<BinRecord>> {
            if spec.feature == "stalled" {
                let _flag = DropFlag(self.dropped.clone());
                return futures::future::pending().await;
            }
            Err(CubeError::StorageError("connection reset".into()))
        }
    }

    #[tokio::test]
    async fn test_first_error_drops_pending_fetches() {
        let dropped = Arc::new(AtomicBool::new(false));
        let source = StalledSource {
            dropped: dropped.clone(),
        };
        let service = TileService::new(Arc::new(source), config(1, MissingTilePolicy::Empty));

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            service.build_tile(TileCoord::new(1, 0, 0), &[spec("stalled"), spec("broken")]),
        )
        .await
        .expect("request must not wait on the stalled fetch");

        assert!(matches!(result, Err(CubeError::StorageError(_))));
        assert!(dropped.load(Ordering::SeqCst));
    }
}
