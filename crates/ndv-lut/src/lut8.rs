//! 256-entry color/gamma tables.
//!
//! Tone mapping runs in two steps per sample:
//!
//! ```text
//!   raw (8/16-bit) --linear rescale [min, max] -> [0, 255]--> u8
//!   u8 --ChannelLut--> [r, g, b]
//! ```
//!
//! The second step is a table lookup. Each table is specific to one
//! (color, gamma) pair, so [`LutCache`] keeps them around between composites.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::trace;

use crate::color::Rgb8;
use crate::{LutError, LutResult};

/// Number of entries in a channel table.
pub const LUT_SIZE: usize = 256;

/// Tables a [`LutCache`] keeps before evicting the least recently used.
pub const MAX_CACHED_LUTS: usize = 64;

/// Lookup table from a rescaled intensity to an RGB contribution.
///
/// Entry `v` is `round(255 * (v / 255)^gamma * component / 255)` for each
/// color component.
///
/// # Example
///
/// ```rust
/// use ndv_lut::{ChannelLut, Rgb8};
///
/// let lut = ChannelLut::new(Rgb8::RED, 2.0).unwrap();
/// assert_eq!(lut.apply(128), [64, 0, 0]);
/// assert_eq!(lut.apply(255), [255, 0, 0]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelLut {
    table: Box<[[u8; 3]; LUT_SIZE]>,
}

impl ChannelLut {
    /// Builds the table for `color` and `gamma`.
    pub fn new(color: Rgb8, gamma: f64) -> LutResult<Self> {
        validate_gamma(gamma)?;
        let frac = color.fractions();
        let mut table = Box::new([[0u8; 3]; LUT_SIZE]);
        for (i, entry) in table.iter_mut().enumerate() {
            let curve = (i as f64 / 255.0).powf(gamma);
            for c in 0..3 {
                entry[c] = (255.0 * curve * frac[c]).round().clamp(0.0, 255.0) as u8;
            }
        }
        Ok(Self { table })
    }

    /// RGB contribution of a rescaled intensity.
    #[inline]
    pub fn apply(&self, value: u8) -> [u8; 3] {
        self.table[value as usize]
    }

    /// The raw table.
    pub fn entries(&self) -> &[[u8; 3]; LUT_SIZE] {
        &self.table
    }
}

/// Linear rescale of a raw sample from `[min, max]` to `[0, 255]`, clamped.
///
/// `max` must exceed `min`; display settings guarantee this.
///
/// ```rust
/// use ndv_lut::rescale_to_u8;
///
/// assert_eq!(rescale_to_u8(100, 100, 1100), 0);
/// assert_eq!(rescale_to_u8(600, 100, 1100), 128);
/// assert_eq!(rescale_to_u8(4000, 100, 1100), 255);
/// ```
#[inline]
pub fn rescale_to_u8(value: u16, min: i32, max: i32) -> u8 {
    let span = f64::from(max) - f64::from(min);
    let t = (f64::from(value) - f64::from(min)) / span;
    (t * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Rejects non-finite or non-positive gamma exponents.
pub fn validate_gamma(gamma: f64) -> LutResult<()> {
    if gamma.is_finite() && gamma > 0.0 {
        Ok(())
    } else {
        Err(LutError::InvalidGamma(gamma))
    }
}

/// Memoizes [`ChannelLut`]s by (color, gamma).
///
/// Shared between composites; safe to use from several threads. Holds at
/// most [`MAX_CACHED_LUTS`] tables, so sweeping a gamma slider does not grow
/// it without bound.
#[derive(Debug, Default)]
pub struct LutCache {
    state: Mutex<LutCacheState>,
}

#[derive(Debug, Default)]
struct LutCacheState {
    tables: HashMap<(Rgb8, u64), (Arc<ChannelLut>, u64)>,
    clock: u64,
}

impl LutCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the table for (color, gamma), building it on first use.
    pub fn get(&self, color: Rgb8, gamma: f64) -> LutResult<Arc<ChannelLut>> {
        validate_gamma(gamma)?;
        let key = (color, gamma.to_bits());
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.clock += 1;
        let now = state.clock;
        if let Some((lut, last_used)) = state.tables.get_mut(&key) {
            *last_used = now;
            return Ok(Arc::clone(lut));
        }

        trace!(?color, gamma, "building channel LUT");
        let lut = Arc::new(ChannelLut::new(color, gamma)?);
        if state.tables.len() >= MAX_CACHED_LUTS {
            let oldest = state
                .tables
                .iter()
                .min_by_key(|(_, (_, last_used))| *last_used)
                .map(|(k, _)| *k);
            if let Some(oldest) = oldest {
                state.tables.remove(&oldest);
            }
        }
        state.tables.insert(key, (Arc::clone(&lut), now));
        Ok(lut)
    }

    /// Number of cached tables.
    pub fn len(&self) -> usize {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).tables.len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
