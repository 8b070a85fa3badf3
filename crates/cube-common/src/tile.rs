//! Quadtree tile and bin addressing.
//!
//! Map tiles and the statistic bins stored inside them share the same
//! Web Mercator quadtree, so both are addressed with [`TileCoord`].

use std::fmt;
use std::str::FromStr;

use geo::{coord, Rect};
use serde::{Deserialize, Serialize};

use crate::error::CubeError;

/// Deepest addressable zoom; x and y at this zoom still fit in a `u32`.
pub const MAX_ZOOM: u32 = 31;

/// A tile coordinate (z/x/y).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    /// Zoom level
    pub z: u32,
    /// Column (x)
    pub x: u32,
    /// Row (y)
    pub y: u32,
}

/// A bin is a quadtree cell addressed exactly like a tile.
pub type BinAddress = TileCoord;

impl TileCoord {
    pub fn new(z: u32, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// Whether x and y fall inside `[0, 2^z)`.
    pub fn is_valid(&self) -> bool {
        if self.z > MAX_ZOOM {
            return false;
        }
        let n = 1u64 << self.z;
        (self.x as u64) < n && (self.y as u64) < n
    }

    /// Canonical string form `"{z}/{x}/{y}"`.
    pub fn key(&self) -> String {
        self.to_string()
    }

    /// Get the four children tiles (zoom + 1).
    ///
    /// Order is row-major within the quadrant: top-left, top-right,
    /// bottom-left, bottom-right.
    ///
    /// Only defined for valid cells below [`MAX_ZOOM`]; callers bound the
    /// target zoom before refining.
    pub fn children(&self) -> [TileCoord; 4] {
        debug_assert!(self.z < MAX_ZOOM && self.is_valid());
        let x = self.x * 2;
        let y = self.y * 2;
        let z = self.z + 1;
        [
            TileCoord { z, x, y },
            TileCoord { z, x: x + 1, y },
            TileCoord { z, x, y: y + 1 },
            TileCoord {
                z,
                x: x + 1,
                y: y + 1,
            },
        ]
    }

    /// Whether `other` lies inside this tile (or is this tile).
    pub fn contains(&self, other: &TileCoord) -> bool {
        if other.z < self.z {
            return false;
        }
        let shift = other.z - self.z;
        (other.x >> shift) == self.x && (other.y >> shift) == self.y
    }

    /// Web Mercator lon/lat bounds of this cell.
    pub fn latlon_bounds(&self) -> Rect<f64> {
        let n = 2f64.powi(self.z as i32);

        let lon_min = self.x as f64 / n * 360.0 - 180.0;
        let lon_max = (self.x + 1) as f64 / n * 360.0 - 180.0;

        let lat_max = (std::f64::consts::PI * (1.0 - 2.0 * self.y as f64 / n))
            .sinh()
            .atan()
            .to_degrees();
        let lat_min = (std::f64::consts::PI * (1.0 - 2.0 * (self.y + 1) as f64 / n))
            .sinh()
            .atan()
            .to_degrees();

        Rect::new(
            coord! { x: lon_min, y: lat_min },
            coord! { x: lon_max, y: lat_max },
        )
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

impl FromStr for TileCoord {
    type Err = CubeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        if parts.len() != 3 {
            return Err(CubeError::invalid_parameter(
                "address",
                format!("expected z/x/y, got '{}'", s),
            ));
        }

        let parse = |part: &str| {
            part.parse::<u32>().map_err(|_| {
                CubeError::invalid_parameter("address", format!("invalid number '{}'", part))
            })
        };

        let coord = TileCoord::new(parse(parts[0])?, parse(parts[1])?, parse(parts[2])?);
        if !coord.is_valid() {
            return Err(CubeError::invalid_parameter(
                "address",
                format!("{} is outside the zoom {} grid", coord, coord.z),
            ));
        }
        Ok(coord)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_roundtrip() {
        let coord = TileCoord::new(7, 12, 99);
        assert_eq!(coord.key(), "7/12/99");
        assert_eq!("7/12/99".parse::<TileCoord>().unwrap(), coord);
    }

    #[test]
    fn test_parse_rejects_bad_addresses() {
        assert!("7/12".parse::<TileCoord>().is_err());
        assert!("a/b/c".parse::<TileCoord>().is_err());
        // x out of range for zoom 1
        assert!("1/2/0".parse::<TileCoord>().is_err());
    }

    #[test]
    fn test_children_quadrant_order() {
        let children = TileCoord::new(4, 5, 7).children();
        assert_eq!(
            children,
            [
                TileCoord::new(5, 10, 14),
                TileCoord::new(5, 11, 14),
                TileCoord::new(5, 10, 15),
                TileCoord::new(5, 11, 15),
            ]
        );
    }

    #[test]
    fn test_children_of_last_refinable_zoom() {
        let edge = (1u32 << 30) - 1;
        let children = TileCoord::new(30, edge, edge).children();
        assert!(children.iter().all(|c| c.is_valid() && c.z == MAX_ZOOM));
        let last = (1u32 << 31) - 1;
        assert_eq!(children[3], TileCoord::new(31, last, last));
    }

    #[test]
    fn test_contains() {
        let tile = TileCoord::new(2, 1, 3);
        assert!(tile.contains(&tile));
        assert!(tile.contains(&TileCoord::new(4, 5, 13)));
        assert!(!tile.contains(&TileCoord::new(4, 8, 13)));
        assert!(!tile.contains(&TileCoord::new(1, 0, 1)));
    }

    #[test]
    fn test_latlon_bounds_world() {
        let bounds = TileCoord::new(0, 0, 0).latlon_bounds();
        assert!((bounds.min().x - (-180.0)).abs() < 1e-9);
        assert!((bounds.max().x - 180.0).abs() < 1e-9);
        // Web Mercator latitude limit
        assert!((bounds.max().y - 85.0511).abs() < 1e-3);
        assert!((bounds.min().y + 85.0511).abs() < 1e-3);
    }

    #[test]
    fn test_is_valid() {
        assert!(TileCoord::new(0, 0, 0).is_valid());
        assert!(!TileCoord::new(0, 1, 0).is_valid());
        assert!(TileCoord::new(3, 7, 7).is_valid());
        assert!(!TileCoord::new(3, 8, 7).is_valid());
        assert!(TileCoord::new(MAX_ZOOM, (1u32 << 31) - 1, 0).is_valid());
        assert!(!TileCoord::new(MAX_ZOOM, 1u32 << 31, 0).is_valid());
        assert!(!TileCoord::new(MAX_ZOOM + 1, 0, 0).is_valid());
    }
}
