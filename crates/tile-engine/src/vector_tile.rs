//! Mapbox Vector Tile encoding of merged bin features.
//!
//! Geometries are projected from lon/lat to Web Mercator and then into the
//! tile's local integer grid (origin top-left, y pointing down). The tile
//! is serialized with the `mvt` crate and gzip-compressed.

use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;
use geo::{Coord, LineString, Polygon};
use mvt::{GeomData, GeomEncoder, GeomType, Tile};

use cube_common::{CubeError, CubeResult, TileCoord};

use crate::merge::{MergedTile, PropertyValue};

/// Default tile extent (integer grid size per tile side).
pub const DEFAULT_EXTENT: u32 = 4096;

/// Encodes merged features into a single-layer vector tile.
#[derive(Debug, Clone)]
pub struct VectorTileEncoder {
    layer_name: String,
    extent: u32,
}

impl VectorTileEncoder {
    pub fn new(layer_name: impl Into<String>, extent: u32) -> Self {
        Self {
            layer_name: layer_name.into(),
            extent,
        }
    }

    /// Encode `features` for the tile at `coord` as gzip-compressed protobuf.
    pub fn encode(&self, features: &MergedTile, coord: TileCoord) -> CubeResult<Vec<u8>> {
        let raw = self.encode_uncompressed(features, coord)?;
        gzip(&raw)
    }

    /// Encode the tile protobuf without compression.
    pub fn encode_uncompressed(
        &self,
        features: &MergedTile,
        coord: TileCoord,
    ) -> CubeResult<Vec<u8>> {
        let mut tile = Tile::new(self.extent);
        let mut layer = tile.create_layer(&self.layer_name);

        for (index, (key, feature)) in features.iter().enumerate() {
            let geometry = self
                .encode_polygon(&feature.geometry, coord)
                .map_err(|e| CubeError::EncodeError(format!("feature {}: {}", key, e)))?;

            let mut tile_feature = layer.into_feature(geometry);
            tile_feature.set_id(index as u64 + 1);
            for (name, value) in &feature.properties {
                match value {
                    PropertyValue::String(s) => tile_feature.add_tag_string(name, s),
                    PropertyValue::Number(n) => tile_feature.add_tag_double(name, *n),
                }
            }
            layer = tile_feature.into_layer();
        }

        tile.add_layer(layer).map_err(encode_error)?;
        tile.to_bytes().map_err(encode_error)
    }

    fn encode_polygon(&self, polygon: &Polygon<f64>, coord: TileCoord) -> Result<GeomData, String> {
        let rings = std::iter::once((polygon.exterior(), RingRole::Exterior))
            .chain(polygon.interiors().iter().map(|r| (r, RingRole::Interior)));

        let mut encoder = GeomEncoder::new(GeomType::Polygon);
        for (ring, role) in rings {
            for (x, y) in tile_ring(ring, coord, self.extent, role)? {
                encoder = encoder.point(x as f64, y as f64).map_err(|e| e.to_string())?;
            }
            encoder = encoder.complete().map_err(|e| e.to_string())?;
        }
        encoder.encode().map_err(|e| e.to_string())
    }
}

impl Default for VectorTileEncoder {
    fn default() -> Self {
        Self::new("maas", DEFAULT_EXTENT)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RingRole {
    Exterior,
    Interior,
}

/// Project lon/lat into the tile's local grid.
pub fn project_to_tile(point: Coord<f64>, coord: TileCoord, extent: u32) -> (f64, f64) {
    let n = 2f64.powi(coord.z as i32);
    let mercator_x = (point.x + 180.0) / 360.0;
    let mercator_y =
        (1.0 - point.y.to_radians().tan().asinh() / std::f64::consts::PI) / 2.0;

    (
        (mercator_x * n - coord.x as f64) * extent as f64,
        (mercator_y * n - coord.y as f64) * extent as f64,
    )
}

/// Project one ring to integer tile space, open and correctly wound.
///
/// Exterior rings get positive area in tile space, interior rings
/// negative. Rings that collapse to fewer than 3 vertices or zero area
/// are rejected.
fn tile_ring(
    ring: &LineString<f64>,
    coord: TileCoord,
    extent: u32,
    role: RingRole,
) -> Result<Vec<(i64, i64)>, String> {
    let mut points: Vec<(i64, i64)> = Vec::with_capacity(ring.0.len());
    for point in ring.coords() {
        let (x, y) = project_to_tile(*point, coord, extent);
        if !x.is_finite() || !y.is_finite() {
            return Err(format!("non-finite coordinate ({}, {})", point.x, point.y));
        }
        let projected = (x.round() as i64, y.round() as i64);
        if points.last() != Some(&projected) {
            points.push(projected);
        }
    }
    if points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    if points.len() < 3 {
        return Err("polygon ring has fewer than 3 distinct vertices".to_string());
    }

    let area = signed_area(&points);
    if area == 0 {
        return Err("polygon ring has zero area".to_string());
    }
    if (area > 0) != (role == RingRole::Exterior) {
        points.reverse();
    }

    Ok(points)
}

/// Twice the surveyor's-formula area in tile coordinates.
fn signed_area(points: &[(i64, i64)]) -> i64 {
    let mut sum = 0i64;
    for i in 0..points.len() {
        let (x1, y1) = points[i];
        let (x2, y2) = points[(i + 1) % points.len()];
        sum += x1 * y2 - x2 * y1;
    }
    sum
}

fn encode_error(e: mvt::Error) -> CubeError {
    CubeError::EncodeError(format!("vector tile: {}", e))
}

fn gzip(bytes: &[u8]) -> CubeResult<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(bytes)
        .map_err(|e| CubeError::EncodeError(format!("gzip failed: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| CubeError::EncodeError(format!("gzip failed: {}", e)))
}
