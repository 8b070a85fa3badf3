//! Application state and shared resources.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use tracing::info;

use output_engine::{ObjectStoreRegionalSource, PopulationCache, PopulationConfig, RegionalTransformEngine};
use storage::{ObjectStorage, ObjectStorageConfig};
use tile_engine::{ObjectStoreBinSource, TileEngineConfig, TileService};

/// Shared application state.
pub struct AppState {
    pub tiles: TileService,
    pub transforms: RegionalTransformEngine,
}

impl AppState {
    /// Build state from environment configuration.
    pub fn from_env() -> Result<Self> {
        let storage_config = ObjectStorageConfig::from_env();
        let storage = ObjectStorage::new(&storage_config)?;
        info!(
            endpoint = %storage_config.endpoint,
            bucket = %storage_config.bucket,
            "Object storage configured"
        );

        Self::with_storage(storage, TileEngineConfig::from_env(), PopulationConfig::from_env())
    }

    /// Build state over an existing storage client.
    pub fn with_storage(
        storage: ObjectStorage,
        tile_config: TileEngineConfig,
        population_config: PopulationConfig,
    ) -> Result<Self> {
        tile_config
            .validate()
            .map_err(|e| anyhow!("invalid tile config: {}", e))?;
        population_config
            .validate()
            .map_err(|e| anyhow!("invalid population config: {}", e))?;

        info!(
            layer = %tile_config.layer_name,
            extent = tile_config.extent,
            bin_level = tile_config.bin_level,
            missing_tile_policy = ?tile_config.missing_tile_policy,
            population_years = ?population_config.years,
            "Engines configured"
        );

        let tiles = TileService::new(
            Arc::new(ObjectStoreBinSource::new(storage.clone())),
            tile_config,
        );
        let transforms = RegionalTransformEngine::new(
            Arc::new(ObjectStoreRegionalSource::new(storage)),
            population_config,
            PopulationCache::new(),
        );

        Ok(Self { tiles, transforms })
    }
}
