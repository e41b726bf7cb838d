//! # ndv-core
//!
//! Core types for viewing multi-resolution, multi-dimensional tile mosaics.
//!
//! - [`Viewport`] - Pan/zoom/resize state and coordinate conversions
//! - [`Rect`], [`TileIndex`] - Dataset geometry
//! - [`AxisPositions`] - Channel, z and time positions
//! - [`ExploredTiles`] - Recentring policy input for open-ended datasets
//! - [`CancelFlag`] - Cooperative cancellation shared with worker threads
//!
//! ## Crate Structure
//!
//! This crate has no internal dependencies and no threads of its own:
//!
//! ```text
//! ndv-core (this crate)
//!    ^
//!    |
//!    +-- ndv-lut (channel display settings, LUTs)
//!    +-- ndv-io (TileSource, tile cache)
//!    +-- ndv-compose (compositor)
//!    +-- ndv-view (scheduler, redraw pipeline)
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod axis;
pub mod cancel;
pub mod error;
pub mod explore;
pub mod rect;
pub mod tile;
pub mod viewport;

pub use axis::AxisPositions;
pub use cancel::CancelFlag;
pub use error::{CoreError, CoreResult};
pub use explore::ExploredTiles;
pub use rect::Rect;
pub use tile::TileIndex;
pub use viewport::{MAX_OVERVIEW_RATIO, MAX_RESOLUTION_INDEX, MIN_ZOOM_EXTENT, Viewport};
