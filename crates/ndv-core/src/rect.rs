//! Rectangles in dataset pixel space.
//!
//! Unlike screen rectangles, dataset rectangles may sit anywhere on the plane:
//! an explore-mode mosaic grows in every direction from its first tile, so the
//! origin is signed while the extent stays unsigned.
//!
//! # Coordinate System
//!
//! ```text
//!        (x_min, y_min)
//!   -x <-------+-----------+------> +x
//!              |  dataset  |
//!              |  bounds   |
//!              +-----------+ (x_max, y_max), exclusive
//!              v +y
//! ```
//!
//! # Example
//!
//! ```rust
//! use ndv_core::Rect;
//!
//! let bounds = Rect::from_corners(-512, -512, 1536, 1024).unwrap();
//! assert_eq!(bounds.width, 2048);
//! assert_eq!(bounds.right(), 1536);
//! assert!(bounds.contains(-1, -1));
//! ```

use crate::error::{CoreError, CoreResult};

/// Axis-aligned rectangle with signed origin and unsigned size.
///
/// Edges follow the half-open convention: `x` is included, `x + width` is not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    /// Left edge
    pub x: i64,
    /// Top edge
    pub y: i64,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Rect {
    /// Creates a rectangle from origin and size.
    #[inline]
    pub const fn new(x: i64, y: i64, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Creates a rectangle from its corners, rejecting empty or inverted input.
    ///
    /// `x_max` and `y_max` are exclusive.
    pub fn from_corners(x_min: i64, y_min: i64, x_max: i64, y_max: i64) -> CoreResult<Self> {
        let invalid = || CoreError::InvalidBounds {
            x_min,
            y_min,
            x_max,
            y_max,
        };
        let width = u32::try_from(x_max - x_min).map_err(|_| invalid())?;
        let height = u32::try_from(y_max - y_min).map_err(|_| invalid())?;
        if width == 0 || height == 0 {
            return Err(invalid());
        }
        Ok(Self::new(x_min, y_min, width, height))
    }

    /// Right edge (exclusive).
    #[inline]
    pub const fn right(&self) -> i64 {
        self.x + self.width as i64
    }

    /// Bottom edge (exclusive).
    #[inline]
    pub const fn bottom(&self) -> i64 {
        self.y + self.height as i64
    }

    /// Returns `true` if the rectangle has no area.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Number of pixels covered.
    #[inline]
    pub const fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Returns `true` if the point lies inside (edges at right/bottom excluded).
    #[inline]
    pub const fn contains(&self, px: i64, py: i64) -> bool {
        px >= self.x && px < self.right() && py >= self.y && py < self.bottom()
    }

    /// Returns `true` if the rectangles share at least one pixel.
    #[inline]
    pub const fn overlaps(&self, other: &Rect) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        self.x < other.right()
            && self.right() > other.x
            && self.y < other.bottom()
            && self.bottom() > other.y
    }

    /// Returns the overlapping part of two rectangles, if any.
    ///
    /// ```rust
    /// use ndv_core::Rect;
    ///
    /// let a = Rect::new(-10, -10, 20, 20);
    /// let b = Rect::new(0, 0, 100, 100);
    /// assert_eq!(a.intersect(&b), Some(Rect::new(0, 0, 10, 10)));
    /// ```
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());

        if x < right && y < bottom {
            Some(Rect::new(x, y, (right - x) as u32, (bottom - y) as u32))
        } else {
            None
        }
    }

    /// Bounding box of both rectangles.
    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect::new(x, y, (right - x) as u32, (bottom - y) as u32)
    }

    /// Returns this rectangle moved by (dx, dy).
    #[inline]
    pub const fn translate(&self, dx: i64, dy: i64) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }
}

impl std::fmt::Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Rect({}, {}, {}x{})",
            self.x, self.y, self.width, self.height
        )
    }
}
