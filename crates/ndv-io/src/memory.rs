//! In-memory tile store with an incrementally built pyramid.
//!
//! [`MemoryTileSource`] stands in for an acquisition writing to disk: tiles
//! are inserted at full resolution, each insert updates every coarser level,
//! and reads assemble arbitrary regions from whichever tiles exist. Missing
//! tiles read as zero; a request that touches no tile at all fails with
//! [`IoError::NotAcquired`].
//!
//! # Example
//!
//! ```rust
//! use ndv_core::{AxisPositions, Rect, TileIndex};
//! use ndv_io::{MemoryTileSource, TileSource};
//!
//! let source = MemoryTileSource::explore(4, 4, 2, 16).unwrap();
//! let axes = AxisPositions::standard();
//! source.insert_tile("GFP", &axes, TileIndex::new(0, 0), vec![100; 16]).unwrap();
//!
//! let region = source.fetch_region("GFP", &axes, 1, Rect::new(0, 0, 2, 2)).unwrap();
//! assert_eq!(region.sample(1, 1), 100);
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

use tracing::trace;

use ndv_core::axis::{CHANNEL, Z};
use ndv_core::{AxisPositions, Rect, TileIndex};

use crate::pyramid::{blit, copy_overlap, downsample_2x, parent_of};
use crate::region::{RawRegion, Samples};
use crate::traits::{TileSource, tiles_covering};
use crate::{IoError, IoResult};

/// Identifies one 2D plane: channel plus every non-channel axis position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct PlaneKey {
    pub(crate) channel: String,
    pub(crate) axes: Vec<(String, i32)>,
}

impl PlaneKey {
    pub(crate) fn new(channel: &str, axes: &AxisPositions) -> Self {
        Self {
            channel: channel.to_owned(),
            axes: axes
                .iter()
                .filter(|(name, _)| *name != CHANNEL)
                .map(|(name, v)| (name.to_owned(), v))
                .collect(),
        }
    }

    fn z(&self) -> Option<i32> {
        self.axes.iter().find(|(n, _)| n == Z).map(|(_, v)| *v)
    }
}

/// Tiles of one plane, indexed by pyramid level.
type Levels = Vec<HashMap<TileIndex, Vec<u16>>>;

/// Thread-safe in-memory multi-resolution tile store.
#[derive(Debug)]
pub struct MemoryTileSource {
    tile_width: u32,
    tile_height: u32,
    bounds: Option<Rect>,
    max_resolution: u32,
    bit_depth: u8,
    pixel_size_um: f64,
    planes: RwLock<HashMap<PlaneKey, Levels>>,
}

impl MemoryTileSource {
    /// Store for a dataset with a fixed extent.
    pub fn bounded(
        tile_width: u32,
        tile_height: u32,
        bounds: Rect,
        max_resolution: u32,
        bit_depth: u8,
    ) -> IoResult<Self> {
        Self::build(tile_width, tile_height, Some(bounds), max_resolution, bit_depth)
    }

    /// Store for an explore dataset that grows in every direction.
    pub fn explore(tile_width: u32, tile_height: u32, max_resolution: u32, bit_depth: u8) -> IoResult<Self> {
        Self::build(tile_width, tile_height, None, max_resolution, bit_depth)
    }

    fn build(
        tile_width: u32,
        tile_height: u32,
        bounds: Option<Rect>,
        max_resolution: u32,
        bit_depth: u8,
    ) -> IoResult<Self> {
        // Every level halves a tile, so each level needs even dimensions.
        let divisor = 1u32 << max_resolution.min(31);
        if tile_width == 0
            || tile_height == 0
            || tile_width % divisor != 0
            || tile_height % divisor != 0
        {
            return Err(IoError::InvalidTileSize {
                width: tile_width,
                height: tile_height,
            });
        }
        Ok(Self {
            tile_width,
            tile_height,
            bounds,
            max_resolution,
            bit_depth: bit_depth.clamp(1, 16),
            pixel_size_um: 1.0,
            planes: RwLock::new(HashMap::new()),
        })
    }

    /// Sets the physical pixel size.
    pub fn with_pixel_size(mut self, um: f64) -> Self {
        self.pixel_size_um = um;
        self
    }

    /// Sample bit depth of stored data.
    pub fn bit_depth(&self) -> u8 {
        self.bit_depth
    }

    /// Stores a full-resolution tile and refreshes its pyramid ancestors.
    pub fn insert_tile(
        &self,
        channel: &str,
        axes: &AxisPositions,
        tile: TileIndex,
        data: Vec<u16>,
    ) -> IoResult<()> {
        let (tw, th) = (self.tile_width, self.tile_height);
        let expected = tw as usize * th as usize;
        if data.len() != expected {
            return Err(IoError::SampleCount {
                expected,
                actual: data.len(),
            });
        }

        let key = PlaneKey::new(channel, axes);
        let mut planes = self.planes.write().unwrap_or_else(PoisonError::into_inner);
        let levels = planes
            .entry(key)
            .or_insert_with(|| vec![HashMap::new(); self.max_resolution as usize + 1]);

        trace!(channel, %tile, "inserting tile");
        levels[0].insert(tile, data);

        let mut child = tile;
        for level in 1..=self.max_resolution as usize {
            let (parent, (qx, qy)) = parent_of(child);
            let half = match levels[level - 1].get(&child) {
                Some(src) => downsample_2x(src, tw, th),
                None => break,
            };
            let dst = levels[level]
                .entry(parent)
                .or_insert_with(|| vec![0; expected]);
            blit(dst, tw, &half, tw / 2, th / 2, qx * tw / 2, qy * th / 2);
            child = parent;
        }
        Ok(())
    }

    /// Number of stored full-resolution tiles across all planes.
    pub fn tile_count(&self) -> usize {
        self.planes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|levels| levels[0].len())
            .sum()
    }
}

impl TileSource for MemoryTileSource {
    fn tile_dimensions(&self) -> (u32, u32) {
        (self.tile_width, self.tile_height)
    }

    fn bounds(&self) -> Option<Rect> {
        self.bounds
    }

    fn pixel_size_um(&self) -> f64 {
        self.pixel_size_um
    }

    fn tile_indices_with_data_at(&self, z: i32) -> HashSet<TileIndex> {
        self.planes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(key, _)| key.z().is_none_or(|kz| kz == z))
            .flat_map(|(_, levels)| levels[0].keys().copied())
            .collect()
    }

    fn fetch_region(
        &self,
        channel: &str,
        axes: &AxisPositions,
        resolution: u32,
        region: Rect,
    ) -> IoResult<RawRegion> {
        if resolution > self.max_resolution {
            return Err(IoError::ResolutionOutOfRange {
                requested: resolution,
                max: self.max_resolution,
            });
        }
        let not_acquired = || IoError::NotAcquired {
            channel: channel.to_owned(),
            resolution,
        };

        let planes = self.planes.read().unwrap_or_else(PoisonError::into_inner);
        let level = planes
            .get(&PlaneKey::new(channel, axes))
            .map(|levels| &levels[resolution as usize])
            .ok_or_else(not_acquired)?;

        let (tw, th) = (self.tile_width, self.tile_height);
        let mut out = vec![0u16; region.area() as usize];
        let mut found = false;
        for index in tiles_covering(region, tw, th) {
            if let Some(data) = level.get(&index) {
                let (x, y) = index.origin(tw, th);
                found |= copy_overlap(data, Rect::new(x, y, tw, th), &mut out, region);
            }
        }
        if !found {
            return Err(not_acquired());
        }

        let samples = if self.bit_depth <= 8 {
            Samples::U8(out.into_iter().map(|v| v.min(255) as u8).collect())
        } else {
            Samples::U16(out)
        };
        RawRegion::new(region, samples)
    }

    fn max_resolution_index(&self) -> u32 {
        self.max_resolution
    }
}
