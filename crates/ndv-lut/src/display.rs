//! Per-channel display settings.
//!
//! Contrast edits arrive from the UI thread while a composite may be reading
//! the same channel on a worker. Each channel therefore sits behind its own
//! mutex, and readers always copy the whole [`ChannelDisplay`] out, so they
//! see a (min, max, gamma) triple from a single write.
//!
//! Channels are registered the first time data for them is seen and are kept
//! for the lifetime of the viewer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::debug;

use crate::color::Rgb8;
use crate::lut8::validate_gamma;
use crate::{LutError, LutResult};

/// Display parameters of one channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelDisplay {
    color: Rgb8,
    gamma: f64,
    contrast_min: i32,
    contrast_max: i32,
    active: bool,
    bit_depth: u8,
}

impl ChannelDisplay {
    /// Settings spanning the full range of `bit_depth`, gamma 1.
    pub fn new(color: Rgb8, bit_depth: u8) -> LutResult<Self> {
        if !(1..=16).contains(&bit_depth) {
            return Err(LutError::InvalidBitDepth(bit_depth));
        }
        Ok(Self {
            color,
            gamma: 1.0,
            contrast_min: 0,
            contrast_max: (1i32 << bit_depth) - 1,
            active: true,
            bit_depth,
        })
    }

    /// Channel color.
    pub fn color(&self) -> Rgb8 {
        self.color
    }

    /// Gamma exponent.
    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    /// Raw value mapped to black.
    pub fn contrast_min(&self) -> i32 {
        self.contrast_min
    }

    /// Raw value mapped to full intensity.
    pub fn contrast_max(&self) -> i32 {
        self.contrast_max
    }

    /// Whether the channel contributes to the composite.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Sample bit depth.
    pub fn bit_depth(&self) -> u8 {
        self.bit_depth
    }

    /// Largest raw value at this bit depth.
    pub fn max_value(&self) -> i32 {
        (1i32 << self.bit_depth) - 1
    }

    /// Sets the color.
    pub fn set_color(&mut self, color: Rgb8) {
        self.color = color;
    }

    /// Sets the active flag.
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Sets the gamma exponent.
    pub fn set_gamma(&mut self, gamma: f64) -> LutResult<()> {
        validate_gamma(gamma)?;
        self.gamma = gamma;
        Ok(())
    }

    /// Moves the lower bound; the upper bound follows if they would cross.
    pub fn set_contrast_min(&mut self, min: i32) {
        self.contrast_min = min.min(i32::MAX - 1);
        if self.contrast_max < self.contrast_min + 1 {
            self.contrast_max = self.contrast_min + 1;
        }
        self.check_window();
    }

    /// Moves the upper bound; the lower bound follows if they would cross.
    pub fn set_contrast_max(&mut self, max: i32) {
        self.contrast_max = max.max(i32::MIN + 1);
        if self.contrast_min > self.contrast_max - 1 {
            self.contrast_min = self.contrast_max - 1;
        }
        self.check_window();
    }

    /// Sets both bounds. If `max` is not above `min`, `min` is kept and `max`
    /// becomes `min + 1`.
    pub fn set_contrast(&mut self, min: i32, max: i32) {
        self.contrast_min = min.min(i32::MAX - 1);
        self.contrast_max = max.max(self.contrast_min + 1);
        self.check_window();
    }

    fn check_window(&self) {
        assert!(
            self.contrast_max > self.contrast_min,
            "contrast window inverted: [{}, {}]",
            self.contrast_min,
            self.contrast_max
        );
    }
}

/// Consistent copy of every channel's settings.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DisplaySnapshot {
    /// Channels in registration order
    pub channels: Vec<(String, ChannelDisplay)>,
    /// `false` when only the selected channel is drawn
    pub composite: bool,
}

impl DisplaySnapshot {
    /// Settings of a named channel.
    pub fn get(&self, name: &str) -> Option<&ChannelDisplay> {
        self.channels.iter().find(|(n, _)| n == name).map(|(_, d)| d)
    }
}

type ChannelEntry = (String, Arc<Mutex<ChannelDisplay>>);

/// Registry of channel display settings.
///
/// # Example
///
/// ```rust
/// use ndv_lut::{DisplaySettings, Rgb8};
///
/// let settings = DisplaySettings::new();
/// assert!(settings.register("GFP", Rgb8::GREEN, 12).unwrap());
/// settings.set_contrast("GFP", 100, 50, 1.0).unwrap();
///
/// let gfp = settings.get("GFP").unwrap();
/// assert_eq!((gfp.contrast_min(), gfp.contrast_max()), (100, 101));
/// ```
#[derive(Debug)]
pub struct DisplaySettings {
    channels: RwLock<Vec<ChannelEntry>>,
    composite: AtomicBool,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplaySettings {
    /// Creates an empty registry in composite mode.
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(Vec::new()),
            composite: AtomicBool::new(true),
        }
    }

    /// Registers a channel if unseen. Returns `true` if it was created.
    pub fn register(&self, name: &str, color: Rgb8, bit_depth: u8) -> LutResult<bool> {
        if self.contains(name) {
            return Ok(false);
        }
        let display = ChannelDisplay::new(color, bit_depth)?;
        let mut channels = self.channels.write().unwrap_or_else(PoisonError::into_inner);
        // Another thread may have won the race between the read and the write.
        if channels.iter().any(|(n, _)| n == name) {
            return Ok(false);
        }
        debug!(channel = name, ?color, bit_depth, "registered channel");
        channels.push((name.to_owned(), Arc::new(Mutex::new(display))));
        Ok(true)
    }

    /// Returns `true` if the channel exists.
    pub fn contains(&self, name: &str) -> bool {
        self.entry(name).is_some()
    }

    /// Number of registered channels.
    pub fn len(&self) -> usize {
        self.channels.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns `true` if no channel is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Channel names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(n, _)| n.clone())
            .collect()
    }

    /// Copy of one channel's settings.
    pub fn get(&self, name: &str) -> Option<ChannelDisplay> {
        let entry = self.entry(name)?;
        let display = *entry.lock().unwrap_or_else(PoisonError::into_inner);
        Some(display)
    }

    /// Applies `f` to a channel under its lock.
    pub fn update<R>(&self, name: &str, f: impl FnOnce(&mut ChannelDisplay) -> R) -> LutResult<R> {
        let entry = self
            .entry(name)
            .ok_or_else(|| LutError::UnknownChannel(name.to_owned()))?;
        let mut display = entry.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(f(&mut display))
    }

    /// Sets contrast window and gamma in one locked write.
    pub fn set_contrast(&self, name: &str, min: i32, max: i32, gamma: f64) -> LutResult<()> {
        validate_gamma(gamma)?;
        self.update(name, |d| {
            d.set_contrast(min, max);
            d.gamma = gamma;
        })
    }

    /// Enables or disables a channel.
    pub fn set_active(&self, name: &str, active: bool) -> LutResult<()> {
        self.update(name, |d| d.set_active(active))
    }

    /// Switches between drawing all active channels and only the selected one.
    pub fn set_composite(&self, composite: bool) {
        self.composite.store(composite, Ordering::Release);
    }

    /// Returns `true` in composite mode.
    pub fn is_composite(&self) -> bool {
        self.composite.load(Ordering::Acquire)
    }

    /// Copies every channel, one lock at a time.
    pub fn snapshot(&self) -> DisplaySnapshot {
        let channels = self.channels.read().unwrap_or_else(PoisonError::into_inner);
        DisplaySnapshot {
            channels: channels
                .iter()
                .map(|(n, e)| (n.clone(), *e.lock().unwrap_or_else(PoisonError::into_inner)))
                .collect(),
            composite: self.is_composite(),
        }
    }

    fn entry(&self, name: &str) -> Option<Arc<Mutex<ChannelDisplay>>> {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, e)| Arc::clone(e))
    }
}
