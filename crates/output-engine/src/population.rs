//! Population tables used for per-capita transforms.
//!
//! Population comes from a yearly datacube. One table (region id to
//! population, all admin levels flattened) is built per representative
//! year and cached for the life of the `PopulationCache`.
//!
//! ## Metrics
//!
//! - `population_cache_hits_total`
//! - `population_cache_misses_total`

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use cube_common::{
    AggregationOption, CubeError, CubeResult, DatacubeParams, RegionalAdmins, TemporalResolution,
};

/// Region id to population for one year.
pub type PopulationLookup = HashMap<String, f64>;

/// Flatten every admin level into one id to value table.
pub fn flatten_admins(admins: &RegionalAdmins) -> PopulationLookup {
    [&admins.country, &admins.admin1, &admins.admin2, &admins.admin3]
        .into_iter()
        .flatten()
        .map(|region| (region.id.clone(), region.value))
        .collect()
}

/// Pick the population year representing `year`.
///
/// An exact match wins, then the latest year before `year`, then the
/// earliest available year. `years` must be sorted ascending.
pub fn resolve_year(year: i32, years: &[i32]) -> CubeResult<i32> {
    let earliest = *years.first().ok_or_else(|| {
        CubeError::PopulationUnavailable("no population years configured".to_string())
    })?;

    Ok(years
        .iter()
        .copied()
        .filter(|candidate| *candidate <= year)
        .max()
        .unwrap_or(earliest))
}

/// Where population aggregates live and which years exist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationConfig {
    pub data_id: String,
    pub run_id: String,
    pub feature: String,

    /// Available years, sorted ascending.
    pub years: Vec<i32>,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            data_id: "population".to_string(),
            run_id: "worldpop".to_string(),
            feature: "total_population".to_string(),
            years: vec![2000, 2005, 2010, 2015, 2020],
        }
    }
}

impl PopulationConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("POPULATION_DATA_ID") {
            config.data_id = val;
        }

        if let Ok(val) = std::env::var("POPULATION_RUN_ID") {
            config.run_id = val;
        }

        if let Ok(val) = std::env::var("POPULATION_FEATURE") {
            config.feature = val;
        }

        if let Ok(val) = std::env::var("POPULATION_YEARS") {
            config.years = parse_years(&val);
        }

        config.years.sort_unstable();
        config.years.dedup();
        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.data_id.is_empty() || self.run_id.is_empty() || self.feature.is_empty() {
            return Err("population data_id, run_id and feature must be set".to_string());
        }

        if self.years.is_empty() {
            return Err("at least one population year is required".to_string());
        }

        if self.years.windows(2).any(|w| w[0] >= w[1]) {
            return Err("population years must be sorted and unique".to_string());
        }

        Ok(())
    }

    /// Parameters of the yearly population datacube.
    pub fn params(&self) -> DatacubeParams {
        DatacubeParams {
            data_id: self.data_id.clone(),
            run_id: self.run_id.clone(),
            feature: self.feature.clone(),
            temporal_resolution: TemporalResolution::Year,
            temporal_aggregation: AggregationOption::Sum,
            spatial_aggregation: AggregationOption::Sum,
        }
    }
}

fn parse_years(val: &str) -> Vec<i32> {
    val.split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect()
}

/// Statistics for the population cache.
#[derive(Default)]
pub struct PopulationCacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
}

impl PopulationCacheStats {
    /// Calculate cache hit rate as a percentage (0-100).
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            (hits as f64 / total as f64) * 100.0
        }
    }
}

/// Shared, additive cache of population tables keyed by year.
///
/// Entries are never replaced or evicted. Clones share the same tables.
#[derive(Clone, Default)]
pub struct PopulationCache {
    tables: Arc<RwLock<HashMap<i32, Arc<PopulationLookup>>>>,
    stats: Arc<PopulationCacheStats>,
}

impl PopulationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached table for `year`, recording a hit or miss.
    pub async fn get(&self, year: i32) -> Option<Arc<PopulationLookup>> {
        let found = self.tables.read().await.get(&year).cloned();
        if found.is_some() {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("population_cache_hits_total").increment(1);
        } else {
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("population_cache_misses_total").increment(1);
        }
        found
    }

    /// Store `table` for `year` unless another writer got there first.
    ///
    /// Returns the table that ends up cached.
    pub async fn insert(&self, year: i32, table: PopulationLookup) -> Arc<PopulationLookup> {
        self.tables
            .write()
            .await
            .entry(year)
            .or_insert_with(|| Arc::new(table))
            .clone()
    }

    pub async fn len(&self) -> usize {
        self.tables.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tables.read().await.is_empty()
    }

    pub fn stats(&self) -> &PopulationCacheStats {
        &self.stats
    }
}
