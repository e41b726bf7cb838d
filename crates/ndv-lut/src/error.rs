//! LUT and display-setting error types.

use thiserror::Error;

/// Result type for LUT operations.
pub type LutResult<T> = Result<T, LutError>;

/// Errors raised by user-supplied display parameters.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LutError {
    /// Gamma must be finite and positive.
    #[error("invalid gamma exponent: {0}")]
    InvalidGamma(f64),

    /// Bit depth outside 1..=16.
    #[error("unsupported bit depth: {0}")]
    InvalidBitDepth(u8),

    /// No settings exist for the named channel.
    #[error("unknown channel: {0}")]
    UnknownChannel(String),
}
