//! # ndv-lut
//!
//! Channel display settings and the lookup tables that tone-map raw samples
//! into display colors.
//!
//! - [`ChannelDisplay`], [`DisplaySettings`] - Color, gamma, contrast window per channel
//! - [`ChannelLut`], [`LutCache`] - 256-entry (color, gamma) tables
//! - [`rescale_to_u8`] - Linear contrast stretch to 8 bits
//!
//! # Usage
//!
//! ```rust
//! use ndv_lut::{rescale_to_u8, LutCache, Rgb8};
//!
//! let cache = LutCache::new();
//! let lut = cache.get(Rgb8::RED, 2.0).unwrap();
//! let rgb = lut.apply(rescale_to_u8(2048, 0, 4095));
//! assert_eq!(rgb[1], 0);
//! ```
//!
//! # Dependencies
//!
//! - [`thiserror`] - Error handling
//! - [`serde`] - Colors are stored in viewer configuration

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod color;
pub mod display;
pub mod error;
pub mod lut8;

pub use color::Rgb8;
pub use display::{ChannelDisplay, DisplaySettings, DisplaySnapshot};
pub use error::{LutError, LutResult};
pub use lut8::{ChannelLut, LUT_SIZE, LutCache, MAX_CACHED_LUTS, rescale_to_u8, validate_gamma};
