//! Quadtree refinement of decoded bins.
//!
//! Stored tiles may carry coarser bins than a request asks for. Refining
//! splits every bin into its quadrant descendants and copies the parent
//! aggregate to each of them (nearest-neighbour, no interpolation).

use cube_common::BinAddress;

use crate::bins::BinRecord;

/// Common zoom of a decoded bin list, if it has any bins.
pub fn resolution_of(bins: &[BinRecord]) -> Option<u32> {
    bins.first().map(|bin| bin.address.z)
}

/// Refine `bins` from zoom `from_zoom` to `to_zoom`.
///
/// Each parent emits `4^(to_zoom - from_zoom)` children in nested 2x2
/// quadrant order, parents keep their relative order. A target at or
/// below the current zoom returns the input unchanged.
pub fn subdivide(bins: Vec<BinRecord>, from_zoom: u32, to_zoom: u32) -> Vec<BinRecord> {
    if to_zoom <= from_zoom {
        return bins;
    }

    let depth = to_zoom - from_zoom;
    let fan_out = 4usize.pow(depth);
    let mut out = Vec::with_capacity(bins.len() * fan_out);

    for bin in &bins {
        push_descendants(bin.address, depth, bin.value, &mut out);
    }

    out
}

fn push_descendants(address: BinAddress, depth: u32, value: f64, out: &mut Vec<BinRecord>) {
    if depth == 0 {
        out.push(BinRecord::new(address, value));
        return;
    }
    for child in address.children() {
        push_descendants(child, depth - 1, value, out);
    }
}
