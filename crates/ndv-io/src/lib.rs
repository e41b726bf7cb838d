//! # ndv-io
//!
//! Tile storage access for the viewer.
//!
//! - [`TileSource`] - The contract every dataset backend implements
//! - [`MemoryTileSource`] - In-memory store with an incremental pyramid
//! - [`CachedTileSource`] - LRU tile cache in front of any source
//! - [`RawRegion`], [`Samples`] - 8/16-bit sample buffers
//!
//! # Example
//!
//! ```rust
//! use ndv_core::{AxisPositions, Rect, TileIndex};
//! use ndv_io::{CachedTileSource, MemoryTileSource, TileSource};
//!
//! let store = MemoryTileSource::bounded(4, 4, Rect::new(0, 0, 8, 8), 1, 12).unwrap();
//! store.insert_tile("DAPI", &AxisPositions::standard(), TileIndex::new(1, 1), vec![7; 16]).unwrap();
//!
//! let cached = CachedTileSource::new(store, 1 << 20);
//! let region = cached
//!     .fetch_region("DAPI", &AxisPositions::standard(), 0, Rect::new(4, 4, 4, 4))
//!     .unwrap();
//! assert_eq!(region.sample(0, 0), 7);
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod cache;
pub mod error;
pub mod memory;
pub mod pyramid;
pub mod region;
pub mod traits;

pub use cache::{CacheStats, CachedTileSource, DEFAULT_CACHE_SIZE};
pub use error::{IoError, IoResult};
pub use memory::MemoryTileSource;
pub use region::{RawRegion, Samples};
pub use traits::{TileArrival, TileSource, tiles_covering};
