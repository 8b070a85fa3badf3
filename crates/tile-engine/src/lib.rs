//! Datacube tile assembly.
//!
//! Turns stored bin tiles into vector tiles. Each stored tile holds an
//! aggregated value for every bin of a quadtree level below the tile;
//! several tile specs can be combined into one output tile.
//!
//! # Architecture
//!
//! ```text
//! GET /tiles/z/x/y?specs=[...]
//!      │
//!      ▼
//! TileService::build_tile
//!      │
//!      ├─► BinTileSource::fetch_bin_tile (one per spec, concurrent)
//!      │         │
//!      │         └─► decode_bin_tile: positions to bin addresses
//!      │
//!      ├─► subdivide: refine every spec to the same bin zoom
//!      │
//!      ├─► merge: one feature per bin address
//!      │
//!      └─► VectorTileEncoder::encode: gzip vector tile
//! ```
//!
//! # Example
//!
//! ```ignore
//! use tile_engine::{ObjectStoreBinSource, TileEngineConfig, TileService};
//!
//! let source = Arc::new(ObjectStoreBinSource::new(storage));
//! let service = TileService::new(source, TileEngineConfig::from_env());
//! let tile = service.build_tile(TileCoord::new(3, 4, 2), &specs).await?;
//! ```

pub mod bins;
pub mod config;
pub mod merge;
pub mod service;
pub mod source;
pub mod subdivide;
pub mod vector_tile;

// Re-export commonly used types at crate root
pub use bins::{bin_level, decode_bin_tile, BinRecord, BinTile};
pub use config::{MissingTilePolicy, TileEngineConfig};
pub use merge::{merge, MergedFeature, MergedTile, PropertyValue, ID_PROPERTY};
pub use service::{Contribution, TileService};
pub use source::{BinTileSource, ObjectStoreBinSource};
pub use subdivide::{resolution_of, subdivide};
pub use vector_tile::{VectorTileEncoder, DEFAULT_EXTENT};
