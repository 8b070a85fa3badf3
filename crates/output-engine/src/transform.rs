//! Per-capita and normalization transforms over regional outputs.

use std::sync::Arc;

use chrono::Datelike;
use tracing::{debug, instrument, warn};

use cube_common::time::{datetime_from_millis, year_start_millis};
use cube_common::{
    CubeError, CubeResult, QualifierAdmins, QualifierRegionValue, RegionValue, RegionalAdmins,
    TimeseriesPoint,
};

use crate::normalize;
use crate::population::{flatten_admins, resolve_year, PopulationCache, PopulationConfig, PopulationLookup};
use crate::source::RegionalAggregationSource;

/// Applies population and normalization transforms.
pub struct RegionalTransformEngine {
    source: Arc<dyn RegionalAggregationSource>,
    config: PopulationConfig,
    cache: PopulationCache,
}

impl RegionalTransformEngine {
    pub fn new(
        source: Arc<dyn RegionalAggregationSource>,
        config: PopulationConfig,
        cache: PopulationCache,
    ) -> Self {
        Self {
            source,
            config,
            cache,
        }
    }

    pub fn cache(&self) -> &PopulationCache {
        &self.cache
    }

    /// Configured population year that represents `timestamp`.
    pub fn representative_year(&self, timestamp: i64) -> CubeResult<i32> {
        let year = datetime_from_millis(timestamp)?.year();
        resolve_year(year, &self.config.years)
    }

    /// Population table for the year representing `timestamp`.
    #[instrument(skip(self))]
    pub async fn population_lookup(&self, timestamp: i64) -> CubeResult<Arc<PopulationLookup>> {
        let year = self.representative_year(timestamp)?;

        if let Some(table) = self.cache.get(year).await {
            debug!(year, "Population cache hit");
            return Ok(table);
        }

        debug!(year, "Population cache miss, fetching aggregates");
        let admins = self
            .source
            .fetch_regional_aggregation(&self.config.params(), year_start_millis(year)?)
            .await?;

        Ok(self.cache.insert(year, flatten_admins(&admins)).await)
    }

    /// Divide every point by the population of `region_id`.
    ///
    /// Each point uses the population of its own representative year. A
    /// missing or zero population for any of those years fails the series.
    pub async fn per_capita_timeseries(
        &self,
        series: &[TimeseriesPoint],
        region_id: &str,
    ) -> CubeResult<Vec<TimeseriesPoint>> {
        let mut out = Vec::with_capacity(series.len());
        let mut current: Option<(i32, f64)> = None;

        for point in series {
            let year = self.representative_year(point.timestamp)?;
            let population = match current {
                Some((cached_year, population)) if cached_year == year => population,
                _ => {
                    let lookup = self.population_lookup(point.timestamp).await?;
                    let population = region_population(&lookup, region_id, year)?;
                    current = Some((year, population));
                    population
                }
            };
            out.push(TimeseriesPoint::new(point.timestamp, point.value / population));
        }

        Ok(out)
    }

    /// Divide every region's value by its population.
    ///
    /// Regions with zero or unknown population are dropped.
    pub async fn per_capita_regional(
        &self,
        admins: &RegionalAdmins,
        timestamp: i64,
    ) -> CubeResult<RegionalAdmins> {
        let lookup = self.population_lookup(timestamp).await?;
        let mut dropped = 0usize;

        let out = admins.map_levels(|regions| {
            regions
                .iter()
                .filter_map(|region| match population_of(&lookup, &region.id) {
                    Some(population) => {
                        Some(RegionValue::new(region.id.clone(), region.value / population))
                    }
                    None => {
                        dropped += 1;
                        None
                    }
                })
                .collect()
        });

        if dropped > 0 {
            warn!(dropped, "Dropped regions without population");
        }
        Ok(out)
    }

    /// Divide every qualifier value of each region by its population.
    ///
    /// Regions with zero or unknown population are dropped.
    pub async fn per_capita_qualifier(
        &self,
        admins: &QualifierAdmins,
        timestamp: i64,
    ) -> CubeResult<QualifierAdmins> {
        let lookup = self.population_lookup(timestamp).await?;
        let mut dropped = 0usize;

        let out = admins.map_levels(|regions| {
            regions
                .iter()
                .filter_map(|region| match population_of(&lookup, &region.id) {
                    Some(population) => Some(QualifierRegionValue {
                        id: region.id.clone(),
                        values: region
                            .values
                            .iter()
                            .map(|(key, value)| (key.clone(), value / population))
                            .collect(),
                    }),
                    None => {
                        dropped += 1;
                        None
                    }
                })
                .collect()
        });

        if dropped > 0 {
            warn!(dropped, "Dropped qualifier regions without population");
        }
        Ok(out)
    }

    pub fn normalize_regional(&self, admins: &RegionalAdmins) -> RegionalAdmins {
        normalize::normalize_regional(admins)
    }

    pub fn normalize_qualifier(&self, admins: &QualifierAdmins) -> QualifierAdmins {
        normalize::normalize_qualifier(admins)
    }
}

fn population_of(lookup: &PopulationLookup, id: &str) -> Option<f64> {
    lookup.get(id).copied().filter(|p| *p != 0.0)
}

fn region_population(lookup: &PopulationLookup, region_id: &str, year: i32) -> CubeResult<f64> {
    match lookup.get(region_id) {
        Some(p) if *p != 0.0 => Ok(*p),
        Some(_) => Err(CubeError::PopulationUnavailable(format!(
            "population of {} is zero in {}",
            region_id, year
        ))),
        None => Err(CubeError::PopulationUnavailable(format!(
            "no population for {} in {}",
            region_id, year
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cube_common::DatacubeParams;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use test_utils::{assert_approx_eq, create_linear_series, date_millis, point_at, regions};

    /// Population source that counts fetches and records requested timestamps.
    struct FixedPopulation {
        admins: RegionalAdmins,
        calls: AtomicUsize,
        last_timestamp: std::sync::Mutex<Option<i64>>,
    }

    impl FixedPopulation {
        fn new(admins: RegionalAdmins) -> Arc<Self> {
            Arc::new(Self {
                admins,
                calls: AtomicUsize::new(0),
                last_timestamp: std::sync::Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl RegionalAggregationSource for FixedPopulation {
        async fn fetch_regional_aggregation(
            &self,
            _params: &DatacubeParams,
            timestamp: i64,
        ) -> CubeResult<RegionalAdmins> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_timestamp.lock().unwrap() = Some(timestamp);
            Ok(self.admins.clone())
        }
    }

    fn population() -> RegionalAdmins {
        RegionalAdmins {
            country: regions(&[("Ethiopia", 100.0), ("Kenya", 50.0)]),
            admin1: regions(&[("Ethiopia__Amhara", 0.0)]),
            ..Default::default()
        }
    }

    fn engine(source: Arc<FixedPopulation>) -> RegionalTransformEngine {
        let config = PopulationConfig {
            years: vec![2000, 2010, 2020],
            ..Default::default()
        };
        RegionalTransformEngine::new(source, config, PopulationCache::new())
    }

    #[tokio::test]
    async fn test_lookup_fetches_january_first_of_resolved_year() {
        let source = FixedPopulation::new(population());
        let engine = engine(source.clone());

        let table = engine.population_lookup(date_millis(2015, 7, 1)).await.unwrap();
        assert_eq!(table["Kenya"], 50.0);
        assert_eq!(
            *source.last_timestamp.lock().unwrap(),
            Some(date_millis(2010, 1, 1))
        );
    }

    #[tokio::test]
    async fn test_lookup_is_cached_per_year() {
        let source = FixedPopulation::new(population());
        let engine = engine(source.clone());

        engine.population_lookup(date_millis(2012, 1, 1)).await.unwrap();
        engine.population_lookup(date_millis(2019, 12, 31)).await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        engine.population_lookup(date_millis(2021, 1, 1)).await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(engine.cache().len().await, 2);
    }

    #[tokio::test]
    async fn test_per_capita_timeseries() {
        let engine = engine(FixedPopulation::new(population()));
        let series = vec![point_at(2019, 1, 1, 200.0), point_at(2020, 1, 1, 50.0)];

        let out = engine.per_capita_timeseries(&series, "Ethiopia").await.unwrap();
        assert_approx_eq!(out[0].value, 2.0, 1e-12);
        assert_approx_eq!(out[1].value, 0.5, 1e-12);
        assert_eq!(out[1].timestamp, series[1].timestamp);

        assert!(engine.per_capita_timeseries(&[], "Ethiopia").await.unwrap().is_empty());
    }

    /// Ethiopia grows by 10 people per year after 2000.
    #[derive(Default)]
    struct GrowingPopulation {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RegionalAggregationSource for GrowingPopulation {
        async fn fetch_regional_aggregation(
            &self,
            _params: &DatacubeParams,
            timestamp: i64,
        ) -> CubeResult<RegionalAdmins> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let year = datetime_from_millis(timestamp)?.year();
            Ok(RegionalAdmins {
                country: regions(&[("Ethiopia", f64::from(year - 2000) * 10.0)]),
                ..Default::default()
            })
        }
    }

    #[tokio::test]
    async fn test_per_capita_timeseries_uses_each_points_year() {
        let source = Arc::new(GrowingPopulation::default());
        let config = PopulationConfig {
            years: vec![2000, 2010, 2020],
            ..Default::default()
        };
        let engine = RegionalTransformEngine::new(source.clone(), config, PopulationCache::new());
        let series = vec![
            point_at(2012, 1, 1, 100.0),
            point_at(2015, 6, 1, 50.0),
            point_at(2021, 1, 1, 100.0),
        ];

        let out = engine.per_capita_timeseries(&series, "Ethiopia").await.unwrap();
        assert_approx_eq!(out[0].value, 1.0, 1e-12);
        assert_approx_eq!(out[1].value, 0.5, 1e-12);
        assert_approx_eq!(out[2].value, 0.5, 1e-12);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);

        // 2005 resolves to 2000, where the population is zero
        let err = engine
            .per_capita_timeseries(&[point_at(2005, 1, 1, 1.0), point_at(2021, 1, 1, 1.0)], "Ethiopia")
            .await
            .unwrap_err();
        assert_eq!(err.http_status_code(), 500);
    }

    #[tokio::test]
    async fn test_per_capita_timeseries_keeps_timestamps() {
        let engine = engine(FixedPopulation::new(population()));
        let series = create_linear_series(date_millis(2020, 1, 1), 86_400_000, 5);

        let out = engine.per_capita_timeseries(&series, "Kenya").await.unwrap();
        assert_eq!(out.len(), 5);
        for (before, after) in series.iter().zip(&out) {
            assert_eq!(before.timestamp, after.timestamp);
            assert_approx_eq!(after.value, before.value / 50.0, 1e-12);
        }
    }

    #[tokio::test]
    async fn test_per_capita_timeseries_requires_population() {
        let engine = engine(FixedPopulation::new(population()));
        let series = vec![point_at(2020, 1, 1, 1.0)];

        let err = engine
            .per_capita_timeseries(&series, "Ethiopia__Amhara")
            .await
            .unwrap_err();
        assert!(matches!(err, CubeError::PopulationUnavailable(_)));

        let err = engine.per_capita_timeseries(&series, "Atlantis").await.unwrap_err();
        assert_eq!(err.http_status_code(), 500);
    }

    #[tokio::test]
    async fn test_per_capita_regional_drops_unknown_and_zero() {
        let engine = engine(FixedPopulation::new(population()));
        let admins = RegionalAdmins {
            country: regions(&[("Ethiopia", 10.0), ("Kenya", 10.0), ("Atlantis", 1.0)]),
            admin1: regions(&[("Ethiopia__Amhara", 4.0)]),
            ..Default::default()
        };

        let out = engine
            .per_capita_regional(&admins, date_millis(2020, 6, 1))
            .await
            .unwrap();
        assert_eq!(out.country, regions(&[("Ethiopia", 0.1), ("Kenya", 0.2)]));
        assert!(out.admin1.is_empty());
        assert!(out.country.iter().all(|r| r.value.is_finite()));
    }

    #[tokio::test]
    async fn test_per_capita_qualifier() {
        let engine = engine(FixedPopulation::new(population()));
        let admins = QualifierAdmins {
            country: vec![
                QualifierRegionValue {
                    id: "Kenya".into(),
                    values: [("maize".to_string(), 25.0), ("wheat".to_string(), 5.0)]
                        .into_iter()
                        .collect(),
                },
                QualifierRegionValue {
                    id: "Atlantis".into(),
                    values: [("maize".to_string(), 1.0)].into_iter().collect(),
                },
            ],
            ..Default::default()
        };

        let out = engine
            .per_capita_qualifier(&admins, date_millis(2020, 6, 1))
            .await
            .unwrap();
        assert_eq!(out.country.len(), 1);
        assert_eq!(out.country[0].values["maize"], 0.5);
        assert_eq!(out.country[0].values["wheat"], 0.1);
    }

    #[tokio::test]
    async fn test_missing_years_is_internal() {
        let source = FixedPopulation::new(population());
        let config = PopulationConfig {
            years: Vec::new(),
            ..Default::default()
        };
        let engine = RegionalTransformEngine::new(source, config, PopulationCache::new());
        let err = engine.population_lookup(0).await.unwrap_err();
        assert_eq!(err.http_status_code(), 500);
    }
}
