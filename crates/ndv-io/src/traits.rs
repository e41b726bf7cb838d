//! The tile source contract.
//!
//! A viewer never owns its pixels. Storage (a growing acquisition on disk, a
//! pyramid in memory, a remote store) sits behind [`TileSource`]:
//!
//! ```text
//! +-------------------+
//! |    TileSource     |
//! +-------------------+
//!         ^
//!         |
//! +-------+--------------+
//! | MemoryTileSource     |
//! | CachedTileSource<S>  |  (wraps any source with an LRU)
//! +----------------------+
//! ```
//!
//! Pyramid levels share the tile size in pixels: level `r` tile `(c, r)`
//! covers full-resolution tiles `[c * 2^r, (c + 1) * 2^r)` on each axis.

use std::collections::HashSet;
use std::sync::Arc;

use ndv_core::{AxisPositions, Rect, TileIndex};

use crate::region::RawRegion;
use crate::IoResult;

/// Notification that a tile was written by the acquisition.
#[derive(Debug, Clone, PartialEq)]
pub struct TileArrival {
    /// Channel name
    pub channel: String,
    /// Axis positions of the new tile (including `channel`)
    pub axes: AxisPositions,
    /// Grid position, `None` when the source does not tile
    pub tile: Option<TileIndex>,
    /// Sample bit depth of the channel
    pub bit_depth: u8,
}

/// Supplier of multi-resolution tile data.
///
/// Implementations must be callable from worker threads. Failures are
/// reported per request; callers treat them as "no data yet".
pub trait TileSource: Send + Sync {
    /// Tile size in pixels (identical at every level).
    fn tile_dimensions(&self) -> (u32, u32);

    /// Dataset extent in full-resolution pixels, `None` for explore datasets.
    fn bounds(&self) -> Option<Rect>;

    /// Returns `true` if the dataset has a fixed extent.
    fn is_spatially_bounded(&self) -> bool {
        self.bounds().is_some()
    }

    /// Physical size of a full-resolution pixel in micrometres.
    fn pixel_size_um(&self) -> f64;

    /// Full-resolution tiles holding data at focal plane `z`, any channel.
    fn tile_indices_with_data_at(&self, z: i32) -> HashSet<TileIndex>;

    /// Reads `region` (in level pixels) of one channel at one pyramid level.
    fn fetch_region(
        &self,
        channel: &str,
        axes: &AxisPositions,
        resolution: u32,
        region: Rect,
    ) -> IoResult<RawRegion>;

    /// Coarsest pyramid level.
    fn max_resolution_index(&self) -> u32;

    /// Called when the acquisition writes a tile, before any redraw.
    fn tile_written(&self, _arrival: &TileArrival) {}
}

impl<T: TileSource + ?Sized> TileSource for Arc<T> {
    fn tile_dimensions(&self) -> (u32, u32) {
        (**self).tile_dimensions()
    }

    fn bounds(&self) -> Option<Rect> {
        (**self).bounds()
    }

    fn is_spatially_bounded(&self) -> bool {
        (**self).is_spatially_bounded()
    }

    fn pixel_size_um(&self) -> f64 {
        (**self).pixel_size_um()
    }

    fn tile_indices_with_data_at(&self, z: i32) -> HashSet<TileIndex> {
        (**self).tile_indices_with_data_at(z)
    }

    fn fetch_region(
        &self,
        channel: &str,
        axes: &AxisPositions,
        resolution: u32,
        region: Rect,
    ) -> IoResult<RawRegion> {
        (**self).fetch_region(channel, axes, resolution, region)
    }

    fn max_resolution_index(&self) -> u32 {
        (**self).max_resolution_index()
    }

    fn tile_written(&self, arrival: &TileArrival) {
        (**self).tile_written(arrival)
    }
}

/// Tiles of one level overlapping `region` (level pixels), row-major.
pub fn tiles_covering(region: Rect, tile_width: u32, tile_height: u32) -> Vec<TileIndex> {
    if region.is_empty() {
        return Vec::new();
    }
    let first = TileIndex::containing(region.x, region.y, tile_width, tile_height);
    let last = TileIndex::containing(region.right() - 1, region.bottom() - 1, tile_width, tile_height);
    (first.row..=last.row)
        .flat_map(|row| (first.col..=last.col).map(move |col| TileIndex::new(col, row)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn covering_spans_origin() {
        let tiles = tiles_covering(Rect::new(-10, -10, 20, 20), 256, 256);
        assert_eq!(
            tiles,
            vec![
                TileIndex::new(-1, -1),
                TileIndex::new(0, -1),
                TileIndex::new(-1, 0),
                TileIndex::new(0, 0),
            ]
        );
    }

    #[test]
    fn covering_aligned_region_is_exact() {
        let tiles = tiles_covering(Rect::new(256, 0, 512, 256), 256, 256);
        assert_eq!(tiles, vec![TileIndex::new(1, 0), TileIndex::new(2, 0)]);
        assert!(tiles_covering(Rect::default(), 256, 256).is_empty());
    }
}
