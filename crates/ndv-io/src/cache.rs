//! Tile cache with LRU eviction.
//!
//! [`CachedTileSource`] wraps any [`TileSource`] and serves region reads from
//! whole cached tiles. Panning by a few pixels then costs a few memcpys instead
//! of another round trip to storage. Memory use is bounded in bytes; the least
//! recently touched tile is evicted first.
//!
//! New acquisitions invalidate the written tile and every pyramid ancestor
//! of it, so a redraw after [`TileSource::tile_written`] never shows stale
//! pixels.
//!
//! # Example
//!
//! ```ignore
//! let store = MemoryTileSource::explore(512, 512, 4, 16)?;
//! let cached = CachedTileSource::new(store, 256 * 1024 * 1024);
//! let region = cached.fetch_region("DAPI", &axes, 2, rect)?;
//! println!("hit rate {:.1}%", cached.stats().hit_rate());
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, trace};

use ndv_core::{AxisPositions, Rect, TileIndex};

use crate::memory::PlaneKey;
use crate::pyramid::{ancestor_at, copy_overlap};
use crate::region::{RawRegion, Samples};
use crate::traits::{TileArrival, TileSource, tiles_covering};
use crate::{IoError, IoResult};

/// Default cache budget in bytes (256MB).
pub const DEFAULT_CACHE_SIZE: usize = 256 * 1024 * 1024;

/// Key for cached tiles.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TileKey {
    plane: PlaneKey,
    level: u32,
    tile: TileIndex,
}

#[derive(Debug)]
struct CachedTile {
    samples: Arc<Samples>,
    last_access: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    tiles: HashMap<TileKey, CachedTile>,
    current_size: usize,
    clock: u64,
    /// Bumped by every invalidation; fills started before a bump are dropped.
    epoch: u64,
    stats: CacheStats,
}

/// Cache statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Tiles served from memory
    pub hits: u64,
    /// Tiles read from the inner source
    pub misses: u64,
    /// Tiles dropped to stay within budget
    pub evictions: u64,
    /// Tiles dropped because new data arrived
    pub invalidations: u64,
    /// Tiles currently cached
    pub tile_count: u64,
    /// Peak memory usage in bytes
    pub peak_size: usize,
}

impl CacheStats {
    /// Hit rate as percentage.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// A [`TileSource`] decorator that keeps recently used tiles in memory.
#[derive(Debug)]
pub struct CachedTileSource<S> {
    inner: S,
    max_size: usize,
    state: Mutex<CacheState>,
}

impl<S: TileSource> CachedTileSource<S> {
    /// Wraps `inner` with a budget of `max_size` bytes.
    pub fn new(inner: S, max_size: usize) -> Self {
        Self {
            inner,
            max_size,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// The wrapped source.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Current memory usage in bytes.
    pub fn size(&self) -> usize {
        self.lock().current_size
    }

    /// Memory budget in bytes.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Returns cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.lock().stats.clone()
    }

    /// Drops every cached tile.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.tiles.clear();
        state.current_size = 0;
        state.stats.tile_count = 0;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a tile's samples, loading it from the inner source on a miss.
    ///
    /// `Ok(None)` means the inner source has no data for that tile. Misses
    /// are not cached, since the acquisition may fill the tile later.
    fn tile(
        &self,
        channel: &str,
        axes: &AxisPositions,
        key: &TileKey,
    ) -> IoResult<Option<Arc<Samples>>> {
        let epoch = {
            let mut state = self.lock();
            state.clock += 1;
            let now = state.clock;
            if let Some(cached) = state.tiles.get_mut(key) {
                cached.last_access = now;
                let samples = Arc::clone(&cached.samples);
                state.stats.hits += 1;
                return Ok(Some(samples));
            }
            state.stats.misses += 1;
            state.epoch
        };

        // Read without holding the lock so other channels can proceed.
        let (tw, th) = self.inner.tile_dimensions();
        let (x, y) = key.tile.origin(tw, th);
        let samples = match self
            .inner
            .fetch_region(channel, axes, key.level, Rect::new(x, y, tw, th))
        {
            Ok(region) => Arc::new(region.samples),
            Err(IoError::NotAcquired { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };

        self.insert(key.clone(), Arc::clone(&samples), epoch);
        Ok(Some(samples))
    }

    /// Caches a tile read at `epoch`, unless an invalidation happened since.
    fn insert(&self, key: TileKey, samples: Arc<Samples>, epoch: u64) {
        let needed = samples.size_bytes();
        let mut state = self.lock();
        if state.epoch != epoch {
            trace!(tile = %key.tile, level = key.level, "dropping fill raced by invalidation");
            return;
        }
        if let Some(old) = state.tiles.remove(&key) {
            state.current_size -= old.samples.size_bytes();
            state.stats.tile_count -= 1;
        }
        Self::ensure_space(&mut state, self.max_size, needed);

        state.clock += 1;
        let now = state.clock;
        state.tiles.insert(
            key,
            CachedTile {
                samples,
                last_access: now,
            },
        );
        state.current_size += needed;
        state.stats.tile_count += 1;
        state.stats.peak_size = state.stats.peak_size.max(state.current_size);
    }

    /// Evicts least recently used tiles until `needed` more bytes fit.
    fn ensure_space(state: &mut CacheState, max: usize, needed: usize) {
        while state.current_size + needed > max {
            let Some(victim) = state
                .tiles
                .iter()
                .min_by_key(|(_, t)| t.last_access)
                .map(|(k, _)| k.clone())
            else {
                return;
            };
            if let Some(evicted) = state.tiles.remove(&victim) {
                trace!(tile = %victim.tile, level = victim.level, "evicting tile");
                state.current_size -= evicted.samples.size_bytes();
                state.stats.evictions += 1;
                state.stats.tile_count -= 1;
            }
        }
    }

    /// Drops a written tile and its ancestors, or the whole plane when the
    /// tile is unknown.
    fn invalidate(&self, arrival: &TileArrival) {
        let plane = PlaneKey::new(&arrival.channel, &arrival.axes);
        let mut state = self.lock();
        state.epoch += 1;
        let before = state.tiles.len();
        match arrival.tile {
            Some(tile) => {
                for level in 0..=self.inner.max_resolution_index() {
                    let key = TileKey {
                        plane: plane.clone(),
                        level,
                        tile: ancestor_at(tile, level),
                    };
                    if let Some(old) = state.tiles.remove(&key) {
                        state.current_size -= old.samples.size_bytes();
                    }
                }
            }
            None => {
                let doomed: Vec<TileKey> = state
                    .tiles
                    .keys()
                    .filter(|k| k.plane == plane)
                    .cloned()
                    .collect();
                for key in doomed {
                    if let Some(old) = state.tiles.remove(&key) {
                        state.current_size -= old.samples.size_bytes();
                    }
                }
            }
        }
        let dropped = (before - state.tiles.len()) as u64;
        state.stats.invalidations += dropped;
        state.stats.tile_count -= dropped;
        if dropped > 0 {
            debug!(channel = %arrival.channel, dropped, "invalidated cached tiles");
        }
    }
}

impl<S: TileSource> TileSource for CachedTileSource<S> {
    fn tile_dimensions(&self) -> (u32, u32) {
        self.inner.tile_dimensions()
    }

    fn bounds(&self) -> Option<Rect> {
        self.inner.bounds()
    }

    fn is_spatially_bounded(&self) -> bool {
        self.inner.is_spatially_bounded()
    }

    fn pixel_size_um(&self) -> f64 {
        self.inner.pixel_size_um()
    }

    fn tile_indices_with_data_at(&self, z: i32) -> HashSet<TileIndex> {
        self.inner.tile_indices_with_data_at(z)
    }

    fn fetch_region(
        &self,
        channel: &str,
        axes: &AxisPositions,
        resolution: u32,
        region: Rect,
    ) -> IoResult<RawRegion> {
        let max = self.inner.max_resolution_index();
        if resolution > max {
            return Err(IoError::ResolutionOutOfRange {
                requested: resolution,
                max,
            });
        }

        let (tw, th) = self.inner.tile_dimensions();
        let plane = PlaneKey::new(channel, axes);
        let mut out = vec![0u16; region.area() as usize];
        let mut found = false;
        let mut eight_bit = true;

        for index in tiles_covering(region, tw, th) {
            let key = TileKey {
                plane: plane.clone(),
                level: resolution,
                tile: index,
            };
            let Some(samples) = self.tile(channel, axes, &key)? else {
                continue;
            };
            let data: Vec<u16> = match samples.as_ref() {
                Samples::U8(v) => v.iter().map(|s| u16::from(*s)).collect(),
                Samples::U16(v) => {
                    eight_bit = false;
                    v.clone()
                }
            };
            let (x, y) = index.origin(tw, th);
            found |= copy_overlap(&data, Rect::new(x, y, tw, th), &mut out, region);
        }

        if !found {
            return Err(IoError::NotAcquired {
                channel: channel.to_owned(),
                resolution,
            });
        }
        let samples = if eight_bit {
            Samples::U8(out.into_iter().map(|v| v as u8).collect())
        } else {
            Samples::U16(out)
        };
        RawRegion::new(region, samples)
    }

    fn max_resolution_index(&self) -> u32 {
        self.inner.max_resolution_index()
    }

    fn tile_written(&self, arrival: &TileArrival) {
        self.invalidate(arrival);
        self.inner.tile_written(arrival);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryTileSource;
    use ndv_core::axis::Z;

    fn axes() -> AxisPositions {
        AxisPositions::standard().with(Z, 0)
    }

    fn store() -> MemoryTileSource {
        let src = MemoryTileSource::explore(4, 4, 1, 16).unwrap();
        src.insert_tile("c", &axes(), TileIndex::new(0, 0), vec![10; 16]).unwrap();
        src.insert_tile("c", &axes(), TileIndex::new(1, 0), vec![20; 16]).unwrap();
        src
    }

    #[test]
    fn cache_stats_start_empty() {
        let cache = CachedTileSource::new(store(), 1024);
        let stats = cache.stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.hit_rate(), 0.0);
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn second_read_hits() {
        let cache = CachedTileSource::new(store(), 1024);
        let rect = Rect::new(2, 0, 4, 2);
        let first = cache.fetch_region("c", &axes(), 0, rect).unwrap();
        let second = cache.fetch_region("c", &axes(), 0, rect).unwrap();
        assert_eq!(first, second);
        assert_eq!(second.sample(0, 0), 10);
        assert_eq!(second.sample(3, 1), 20);

        let stats = cache.stats();
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.tile_count, 2);
        assert_eq!(cache.size(), 2 * 16 * 2);
    }

    #[test]
    fn lru_evicts_oldest() {
        // Room for exactly two 16-sample u16 tiles.
        let src = store();
        src.insert_tile("c", &axes(), TileIndex::new(2, 0), vec![30; 16]).unwrap();
        let cache = CachedTileSource::new(src, 64);

        let tile = |col: i64| Rect::new(col * 4, 0, 4, 4);
        cache.fetch_region("c", &axes(), 0, tile(0)).unwrap();
        cache.fetch_region("c", &axes(), 0, tile(1)).unwrap();
        cache.fetch_region("c", &axes(), 0, tile(0)).unwrap();
        cache.fetch_region("c", &axes(), 0, tile(2)).unwrap();

        let stats = cache.stats();
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.tile_count, 2);
        assert!(cache.size() <= cache.max_size());

        // Tile 0 was touched more recently than tile 1, so it survived.
        cache.fetch_region("c", &axes(), 0, tile(0)).unwrap();
        assert_eq!(cache.stats().hits, 2);
    }

    #[test]
    fn write_invalidates_ancestors() {
        let cache = CachedTileSource::new(store(), 4096);
        let level1 = Rect::new(0, 0, 4, 4);
        let before = cache.fetch_region("c", &axes(), 1, level1).unwrap();
        assert_eq!(before.sample(0, 0), 10);

        cache
            .inner()
            .insert_tile("c", &axes(), TileIndex::new(0, 0), vec![90; 16])
            .unwrap();
        cache.tile_written(&TileArrival {
            channel: "c".into(),
            axes: axes(),
            tile: Some(TileIndex::new(0, 0)),
            bit_depth: 16,
        });
        assert_eq!(cache.stats().invalidations, 1);

        let after = cache.fetch_region("c", &axes(), 1, level1).unwrap();
        assert_eq!(after.sample(0, 0), 90);
    }

    #[test]
    fn unknown_tile_invalidates_plane() {
        let cache = CachedTileSource::new(store(), 4096);
        cache.fetch_region("c", &axes(), 0, Rect::new(0, 0, 8, 4)).unwrap();
        assert_eq!(cache.stats().tile_count, 2);
        cache.tile_written(&TileArrival {
            channel: "c".into(),
            axes: axes(),
            tile: None,
            bit_depth: 16,
        });
        assert_eq!(cache.stats().tile_count, 0);
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn missing_tiles_are_not_cached() {
        let cache = CachedTileSource::new(store(), 4096);
        assert!(matches!(
            cache.fetch_region("c", &axes(), 0, Rect::new(100, 100, 4, 4)),
            Err(IoError::NotAcquired { .. })
        ));
        assert_eq!(cache.stats().tile_count, 0);
    }
}
