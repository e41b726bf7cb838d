//! RGB output buffer.

use rayon::prelude::*;

use ndv_lut::{ChannelLut, rescale_to_u8};
use ndv_io::RawRegion;

/// Interleaved 8-bit RGB image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbRaster {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// `[r, g, b, r, g, b, ...]`, row-major
    pub data: Vec<u8>,
}

impl RgbRaster {
    /// Black raster.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * 3],
        }
    }

    /// Pixel at `(x, y)`.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let i = (y as usize * self.width as usize + x as usize) * 3;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    /// Tone-maps `region` through `lut` and adds it with per-component
    /// saturation.
    ///
    /// `region` must have the raster's dimensions.
    pub fn add_channel(&mut self, region: &RawRegion, lut: &ChannelLut, min: i32, max: i32) {
        debug_assert_eq!(region.pixel_count(), self.data.len() / 3);
        let width = self.width as usize;
        if width == 0 {
            return;
        }
        self.data
            .par_chunks_mut(width * 3)
            .enumerate()
            .for_each(|(y, row)| {
                for x in 0..width {
                    let raw = region.samples.get(y * width + x);
                    let rgb = lut.apply(rescale_to_u8(raw, min, max));
                    let px = &mut row[x * 3..x * 3 + 3];
                    for c in 0..3 {
                        px[c] = px[c].saturating_add(rgb[c]);
                    }
                }
            });
    }
}
