//! Error types for ndv-core operations.
//!
//! Only conditions a caller can trigger with runtime input are errors here.
//! Boundary-policy rejections (zooming past the minimum extent, panning out of
//! the dataset) are silently clamped by [`crate::Viewport`], and programming
//! errors such as an unregistered axis name panic instead.
//!
//! # Usage
//!
//! ```rust
//! use ndv_core::{CoreError, CoreResult};
//!
//! fn check_display(width: u32, height: u32) -> CoreResult<()> {
//!     if width == 0 || height == 0 {
//!         return Err(CoreError::InvalidDimensions { width, height });
//!     }
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Result type alias using [`CoreError`] as the error type.
pub type CoreResult<T> = std::result::Result<T, CoreError>;

/// Errors that can occur while building viewport state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Display or tile dimensions are zero.
    #[error("invalid dimensions: {width}x{height}")]
    InvalidDimensions {
        /// Width in pixels
        width: u32,
        /// Height in pixels
        height: u32,
    },

    /// Dataset bounds do not describe a non-empty rectangle.
    #[error("invalid bounds: ({x_min}, {y_min}) - ({x_max}, {y_max})")]
    InvalidBounds {
        /// Left edge (inclusive)
        x_min: i64,
        /// Top edge (inclusive)
        y_min: i64,
        /// Right edge (exclusive)
        x_max: i64,
        /// Bottom edge (exclusive)
        y_max: i64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = CoreError::InvalidDimensions {
            width: 0,
            height: 480,
        };
        assert_eq!(err.to_string(), "invalid dimensions: 0x480");

        let err = CoreError::InvalidBounds {
            x_min: 10,
            y_min: 0,
            x_max: 10,
            y_max: 5,
        };
        assert!(err.to_string().contains("(10, 0)"));
    }
}
