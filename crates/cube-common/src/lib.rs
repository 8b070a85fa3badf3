//! Common types and utilities shared across the datacube tile services.

pub mod datacube;
pub mod error;
pub mod region;
pub mod tile;
pub mod time;

pub use datacube::{DatacubeParams, TileSpec};
pub use error::{CubeError, CubeResult, ErrorKind};
pub use region::{AdminLevel, QualifierAdmins, QualifierRegionValue, RegionValue, RegionalAdmins};
pub use tile::{BinAddress, TileCoord, MAX_ZOOM};
pub use time::{AggregationOption, RawResolution, TemporalResolution, Timeseries, TimeseriesPoint};
