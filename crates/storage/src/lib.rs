//! Storage abstractions for the datacube tile services.
//!
//! Provides object storage (MinIO/S3) access for stored bin tiles and
//! regional aggregation outputs.

pub mod object_store;

pub use self::object_store::{ObjectStorage, ObjectStorageConfig};
