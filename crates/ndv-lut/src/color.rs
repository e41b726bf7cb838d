//! 8-bit display colors for channels.

use serde::{Deserialize, Serialize};

/// An sRGB display color, one byte per component.
///
/// A channel's color scales its tone-mapped intensity: a pure red channel
/// contributes only to the red component of the composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb8 {
    /// Red
    pub r: u8,
    /// Green
    pub g: u8,
    /// Blue
    pub b: u8,
}

impl Rgb8 {
    /// White, the color of channels without a preference.
    pub const WHITE: Rgb8 = Rgb8::new(255, 255, 255);
    /// Red
    pub const RED: Rgb8 = Rgb8::new(255, 0, 0);
    /// Green
    pub const GREEN: Rgb8 = Rgb8::new(0, 255, 0);
    /// Blue
    pub const BLUE: Rgb8 = Rgb8::new(0, 0, 255);
    /// Cyan
    pub const CYAN: Rgb8 = Rgb8::new(0, 255, 255);
    /// Magenta
    pub const MAGENTA: Rgb8 = Rgb8::new(255, 0, 255);
    /// Yellow
    pub const YELLOW: Rgb8 = Rgb8::new(255, 255, 0);

    /// Creates a color.
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Components as fractions of full scale.
    pub fn fractions(&self) -> [f64; 3] {
        [
            f64::from(self.r) / 255.0,
            f64::from(self.g) / 255.0,
            f64::from(self.b) / 255.0,
        ]
    }
}

impl Default for Rgb8 {
    fn default() -> Self {
        Self::WHITE
    }
}

impl From<[u8; 3]> for Rgb8 {
    fn from(c: [u8; 3]) -> Self {
        Self::new(c[0], c[1], c[2])
    }
}
