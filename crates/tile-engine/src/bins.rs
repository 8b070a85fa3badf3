//! Stored bin tile payloads.
//!
//! Each stored object holds the pre-aggregated statistics for one tile,
//! split into a square grid of `total_bins` quadtree cells. Entries are
//! addressed by their row-major position inside that grid.

use tracing::debug;

use cube_common::{BinAddress, CubeError, CubeResult, TileCoord, MAX_ZOOM};
use prost::Message;

/// Stored tile message.
#[derive(Clone, PartialEq, prost::Message)]
pub struct BinTile {
    #[prost(message, optional, tag = "1")]
    pub coord: Option<BinTileCoord>,
    #[prost(message, optional, tag = "2")]
    pub bins: Option<Bins>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct BinTileCoord {
    #[prost(uint32, tag = "1")]
    pub z: u32,
    #[prost(uint32, tag = "2")]
    pub x: u32,
    #[prost(uint32, tag = "3")]
    pub y: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Bins {
    #[prost(uint32, tag = "1")]
    pub total_bins: u32,
    #[prost(message, repeated, tag = "2")]
    pub stats: Vec<BinStat>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct BinStat {
    #[prost(uint32, tag = "1")]
    pub position: u32,
    #[prost(double, tag = "2")]
    pub sum: f64,
}

impl BinTile {
    /// Build a tile message from `(position, sum)` pairs.
    pub fn new(coord: TileCoord, total_bins: u32, stats: impl IntoIterator<Item = (u32, f64)>) -> Self {
        Self {
            coord: Some(BinTileCoord {
                z: coord.z,
                x: coord.x,
                y: coord.y,
            }),
            bins: Some(Bins {
                total_bins,
                stats: stats
                    .into_iter()
                    .map(|(position, sum)| BinStat { position, sum })
                    .collect(),
            }),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.encode_to_vec()
    }
}

/// One decoded bin and its aggregate value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinRecord {
    pub address: BinAddress,
    pub value: f64,
}

impl BinRecord {
    pub fn new(address: BinAddress, value: f64) -> Self {
        Self { address, value }
    }
}

/// Number of quadtree levels packed into a tile of `total_bins` bins.
///
/// `total_bins` must be a power of 4; the result is `log4(total_bins)`.
pub fn bin_level(total_bins: u32) -> CubeResult<u32> {
    if total_bins == 0 || !total_bins.is_power_of_two() || total_bins.trailing_zeros() % 2 != 0 {
        return Err(CubeError::InvalidBinCount(total_bins));
    }
    Ok(total_bins.trailing_zeros() / 2)
}

/// Decode a stored payload for the tile at `coord` into bin records.
///
/// Records come back ordered by bin position.
pub fn decode_bin_tile(payload: &[u8], coord: TileCoord) -> CubeResult<Vec<BinRecord>> {
    let tile = BinTile::decode(payload)?;

    if let Some(stored) = &tile.coord {
        if (stored.z, stored.x, stored.y) != (coord.z, coord.x, coord.y) {
            debug!(
                stored = %format!("{}/{}/{}", stored.z, stored.x, stored.y),
                requested = %coord,
                "Stored tile coordinate differs from requested coordinate"
            );
        }
    }

    let bins = tile.bins.unwrap_or_default();
    let level = bin_level(bins.total_bins)?;
    let child_zoom = coord.z + level;
    if child_zoom > MAX_ZOOM {
        return Err(CubeError::InvalidPayload(format!(
            "bin zoom {} exceeds the addressable range",
            child_zoom
        )));
    }
    let per_axis = 1u32 << level;

    let mut stats = bins.stats;
    stats.sort_by_key(|stat| stat.position);

    stats
        .into_iter()
        .map(|stat| {
            if stat.position >= bins.total_bins {
                return Err(CubeError::InvalidBinPosition {
                    position: stat.position,
                    total_bins: bins.total_bins,
                });
            }
            let address = BinAddress::new(
                child_zoom,
                coord.x * per_axis + stat.position % per_axis,
                coord.y * per_axis + stat.position / per_axis,
            );
            Ok(BinRecord::new(address, stat.sum))
        })
        .collect()
}
