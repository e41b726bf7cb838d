//! Non-spatial axis positions (channel, z-slice, time frame).
//!
//! The set of axes is fixed when an [`AxisPositions`] is created. Asking for an
//! axis that was never registered is a caller bug, so [`AxisPositions::get`]
//! and [`AxisPositions::set`] panic instead of inventing a value.

use std::collections::BTreeMap;

/// Channel axis name.
pub const CHANNEL: &str = "channel";
/// Focal plane axis name.
pub const Z: &str = "z";
/// Time-point axis name.
pub const TIME: &str = "time";

/// Mapping from axis name to integer index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AxisPositions {
    positions: BTreeMap<String, i32>,
}

impl AxisPositions {
    /// Registers the given axes, each at position 0.
    pub fn new<I, S>(axes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            positions: axes.into_iter().map(|a| (a.into(), 0)).collect(),
        }
    }

    /// The `channel`, `z` and `time` axes.
    pub fn standard() -> Self {
        Self::new([CHANNEL, Z, TIME])
    }

    /// Builder-style setter, for constructing arrival positions.
    ///
    /// ```rust
    /// use ndv_core::axis::{AxisPositions, Z, TIME};
    ///
    /// let pos = AxisPositions::standard().with(Z, 4).with(TIME, 2);
    /// assert_eq!(pos.get(Z), 4);
    /// ```
    pub fn with(mut self, axis: &str, value: i32) -> Self {
        self.set(axis, value);
        self
    }

    /// Position along `axis`.
    ///
    /// # Panics
    ///
    /// Panics if `axis` was not registered.
    pub fn get(&self, axis: &str) -> i32 {
        match self.positions.get(axis) {
            Some(v) => *v,
            None => panic!("unknown axis '{axis}'"),
        }
    }

    /// Sets the position along `axis`.
    ///
    /// # Panics
    ///
    /// Panics if `axis` was not registered.
    pub fn set(&mut self, axis: &str, value: i32) {
        match self.positions.get_mut(axis) {
            Some(v) => *v = value,
            None => panic!("unknown axis '{axis}'"),
        }
    }

    /// Returns `true` if `axis` is registered.
    pub fn contains(&self, axis: &str) -> bool {
        self.positions.contains_key(axis)
    }

    /// Iterates `(axis, position)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, i32)> {
        self.positions.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Registered axis names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.positions.keys().map(String::as_str)
    }
}

impl Default for AxisPositions {
    fn default() -> Self {
        Self::standard()
    }
}
