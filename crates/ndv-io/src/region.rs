//! Raw sample buffers returned by tile sources.

use ndv_core::Rect;

use crate::{IoError, IoResult};

/// Single-channel samples at their native width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Samples {
    /// 8-bit samples
    U8(Vec<u8>),
    /// 9 to 16-bit samples
    U16(Vec<u16>),
}

impl Samples {
    /// Zero-filled buffer wide enough for `bit_depth`.
    pub fn zeroed(bit_depth: u8, len: usize) -> Self {
        if bit_depth <= 8 {
            Samples::U8(vec![0; len])
        } else {
            Samples::U16(vec![0; len])
        }
    }

    /// Number of samples.
    #[inline]
    pub fn len(&self) -> usize {
        match self {
            Samples::U8(v) => v.len(),
            Samples::U16(v) => v.len(),
        }
    }

    /// Returns `true` if there are no samples.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sample `i` widened to 16 bits.
    #[inline]
    pub fn get(&self, i: usize) -> u16 {
        match self {
            Samples::U8(v) => u16::from(v[i]),
            Samples::U16(v) => v[i],
        }
    }

    /// Bytes held.
    pub fn size_bytes(&self) -> usize {
        match self {
            Samples::U8(v) => v.len(),
            Samples::U16(v) => v.len() * 2,
        }
    }
}

/// A rectangle of samples at one pyramid level.
///
/// `rect` is expressed in pixels of that level. Layout is row-major with no
/// padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRegion {
    /// Region covered, in level pixels
    pub rect: Rect,
    /// Row-major samples
    pub samples: Samples,
}

impl RawRegion {
    /// Wraps samples, checking their count against the rectangle.
    pub fn new(rect: Rect, samples: Samples) -> IoResult<Self> {
        let expected = rect.area() as usize;
        if samples.len() != expected {
            return Err(IoError::SampleCount {
                expected,
                actual: samples.len(),
            });
        }
        Ok(Self { rect, samples })
    }

    /// Zero-filled region.
    pub fn zeroed(rect: Rect, bit_depth: u8) -> Self {
        Self {
            rect,
            samples: Samples::zeroed(bit_depth, rect.area() as usize),
        }
    }

    /// Sample at coordinates relative to the region origin.
    #[inline]
    pub fn sample(&self, local_x: u32, local_y: u32) -> u16 {
        self.samples
            .get(local_y as usize * self.rect.width as usize + local_x as usize)
    }

    /// Number of pixels.
    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.samples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_checked() {
        let rect = Rect::new(0, 0, 3, 2);
        assert!(RawRegion::new(rect, Samples::U8(vec![0; 6])).is_ok());
        let err = RawRegion::new(rect, Samples::U16(vec![0; 5])).unwrap_err();
        assert!(matches!(err, IoError::SampleCount { expected: 6, actual: 5 }));
    }

    #[test]
    fn sample_addressing() {
        let rect = Rect::new(-4, 10, 3, 2);
        let region = RawRegion::new(rect, Samples::U16(vec![1, 2, 3, 4, 5, 600])).unwrap();
        assert_eq!(region.sample(0, 0), 1);
        assert_eq!(region.sample(2, 1), 600);
        assert_eq!(region.pixel_count(), 6);
    }

    #[test]
    fn zeroed_picks_width() {
        assert!(matches!(Samples::zeroed(8, 4), Samples::U8(_)));
        assert!(matches!(Samples::zeroed(12, 4), Samples::U16(_)));
        assert_eq!(Samples::zeroed(16, 4).size_bytes(), 8);
    }
}
