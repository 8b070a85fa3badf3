//! Timeseries and regional output transforms.
//!
//! - **Coverage correction**: drop or rescale a summed series' trailing
//!   bucket when the raw data only covers part of it
//! - **Per-capita**: divide by population from a yearly datacube, with
//!   population tables cached per year
//! - **Normalization**: min-max scaling per admin level and per qualifier
//!
//! # Example
//!
//! ```ignore
//! use output_engine::{ObjectStoreRegionalSource, PopulationCache, PopulationConfig, RegionalTransformEngine};
//!
//! let source = Arc::new(ObjectStoreRegionalSource::new(storage));
//! let engine = RegionalTransformEngine::new(source, PopulationConfig::from_env(), PopulationCache::new());
//! let per_capita = engine.per_capita_regional(&admins, timestamp).await?;
//! ```

pub mod coverage;
pub mod normalize;
pub mod population;
pub mod source;
pub mod transform;

// Re-export commonly used types at crate root
pub use coverage::{correct, correct_with_outcome, coverage, Correction};
pub use normalize::{normalize, normalize_qualifier, normalize_regional};
pub use population::{resolve_year, PopulationCache, PopulationConfig, PopulationLookup};
pub use source::{ObjectStoreRegionalSource, RegionalAggregationSource};
pub use transform::RegionalTransformEngine;
