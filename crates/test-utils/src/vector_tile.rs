//! Minimal Mapbox Vector Tile reader for asserting on served tiles.

use std::collections::HashMap;
use std::io::Read;

use flate2::read::GzDecoder;
use prost::Message;

#[derive(Clone, PartialEq, prost::Message)]
pub struct VectorTile {
    #[prost(message, repeated, tag = "3")]
    pub layers: Vec<VectorTileLayer>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct VectorTileLayer {
    #[prost(string, required, tag = "1")]
    pub name: String,
    #[prost(message, repeated, tag = "2")]
    pub features: Vec<VectorTileFeature>,
    #[prost(string, repeated, tag = "3")]
    pub keys: Vec<String>,
    #[prost(message, repeated, tag = "4")]
    pub values: Vec<VectorTileValue>,
    #[prost(uint32, optional, tag = "5")]
    pub extent: Option<u32>,
    #[prost(uint32, required, tag = "15")]
    pub version: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct VectorTileFeature {
    #[prost(uint64, optional, tag = "1")]
    pub id: Option<u64>,
    #[prost(uint32, repeated, packed = "true", tag = "2")]
    pub tags: Vec<u32>,
    #[prost(int32, optional, tag = "3")]
    pub geometry_type: Option<i32>,
    #[prost(uint32, repeated, packed = "true", tag = "4")]
    pub geometry: Vec<u32>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct VectorTileValue {
    #[prost(string, optional, tag = "1")]
    pub string_value: Option<String>,
    #[prost(float, optional, tag = "2")]
    pub float_value: Option<f32>,
    #[prost(double, optional, tag = "3")]
    pub double_value: Option<f64>,
    #[prost(int64, optional, tag = "4")]
    pub int_value: Option<i64>,
    #[prost(uint64, optional, tag = "5")]
    pub uint_value: Option<u64>,
    #[prost(sint64, optional, tag = "6")]
    pub sint_value: Option<i64>,
    #[prost(bool, optional, tag = "7")]
    pub bool_value: Option<bool>,
}

/// Polygon geometry type id.
pub const GEOM_POLYGON: i32 = 3;

/// Gunzip and decode a served tile.
pub fn decode_vector_tile(bytes: &[u8]) -> VectorTile {
    let mut raw = Vec::new();
    GzDecoder::new(bytes)
        .read_to_end(&mut raw)
        .expect("tile is not gzip");
    VectorTile::decode(raw.as_slice()).expect("tile is not a vector tile")
}

/// Feature properties rendered as strings, keyed by property name.
pub fn feature_properties(
    layer: &VectorTileLayer,
    feature: &VectorTileFeature,
) -> HashMap<String, String> {
    feature
        .tags
        .chunks(2)
        .map(|pair| {
            let key = layer.keys[pair[0] as usize].clone();
            let value = &layer.values[pair[1] as usize];
            let text = match (&value.string_value, value.double_value) {
                (Some(s), _) => s.clone(),
                (None, Some(n)) => n.to_string(),
                _ => panic!("unexpected value type for {}", key),
            };
            (key, text)
        })
        .collect()
}

/// Absolute vertices of every ring in a polygon geometry.
pub fn polygon_rings(geometry: &[u32]) -> Vec<Vec<(i64, i64)>> {
    fn unzigzag(value: u32) -> i64 {
        (((value >> 1) as i32) ^ -((value & 1) as i32)) as i64
    }

    let mut rings = Vec::new();
    let mut ring = Vec::new();
    let mut cursor = (0i64, 0i64);
    let mut i = 0;
    while i < geometry.len() {
        let id = geometry[i] & 0x7;
        let count = (geometry[i] >> 3) as usize;
        i += 1;
        match id {
            1 | 2 => {
                for _ in 0..count {
                    cursor.0 += unzigzag(geometry[i]);
                    cursor.1 += unzigzag(geometry[i + 1]);
                    ring.push(cursor);
                    i += 2;
                }
            }
            7 => rings.push(std::mem::take(&mut ring)),
            other => panic!("unknown geometry command {}", other),
        }
    }
    rings
}

/// Twice the signed ring area; positive is clockwise in tile space.
pub fn ring_area(points: &[(i64, i64)]) -> i64 {
    let mut sum = 0i64;
    for i in 0..points.len() {
        let (x1, y1) = points[i];
        let (x2, y2) = points[(i + 1) % points.len()];
        sum += x1 * y2 - x2 * y1;
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polygon_rings_decodes_square() {
        // MoveTo(0,0) LineTo(+4,0)(0,+4)(-4,0) ClosePath
        let geometry = [9, 0, 0, 26, 8, 0, 0, 8, 7, 0, 15];
        let rings = polygon_rings(&geometry);
        assert_eq!(rings, vec![vec![(0, 0), (4, 0), (4, 4), (0, 4)]]);
        assert_eq!(ring_area(&rings[0]), 32);
    }
}
