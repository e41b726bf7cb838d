//! # ndv-compose
//!
//! Turns a viewport snapshot into a displayable RGB image.
//!
//! Each drawn channel is fetched from a [`TileSource`](ndv_io::TileSource)
//! at the viewport's pyramid level, contrast-stretched to 8 bits, mapped
//! through its color/gamma LUT and added into one buffer with per-component
//! saturation. Raw-sample statistics come back alongside the image.
//!
//! - [`Compositor`] - The composite pass, holding the LUT cache
//! - [`RgbRaster`] - Interleaved RGB output
//! - [`ChannelStats`], [`Histogram`] - Per-channel statistics
//!
//! # Example
//!
//! ```rust
//! use ndv_compose::Compositor;
//! use ndv_core::{AxisPositions, CancelFlag, Rect, TileIndex, Viewport};
//! use ndv_io::{MemoryTileSource, TileSource};
//! use ndv_lut::{DisplaySettings, Rgb8};
//!
//! let source = MemoryTileSource::bounded(8, 8, Rect::new(0, 0, 8, 8), 0, 8).unwrap();
//! source.insert_tile("GFP", &AxisPositions::standard(), TileIndex::new(0, 0), vec![255; 64]).unwrap();
//!
//! let settings = DisplaySettings::new();
//! settings.register("GFP", Rgb8::GREEN, 8).unwrap();
//!
//! let viewport = Viewport::new(8, 8, source.bounds(), 0).unwrap();
//! let out = Compositor::new()
//!     .composite(&viewport, &settings.snapshot(), &source, &CancelFlag::new())
//!     .unwrap();
//! assert_eq!(out.raster.pixel(3, 3), [0, 255, 0]);
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod compositor;
pub mod raster;
pub mod stats;

pub use compositor::{Composite, Compositor};
pub use raster::RgbRaster;
pub use stats::{ChannelStats, HISTOGRAM_BINS, Histogram};
