//! I/O error types.

use thiserror::Error;

/// Result type for tile I/O.
pub type IoResult<T> = Result<T, IoError>;

/// Errors raised by tile sources.
///
/// Readers of a [`crate::TileSource`] treat every variant the same way (the
/// channel is drawn as empty), but the variants keep logs meaningful.
#[derive(Debug, Error)]
pub enum IoError {
    /// No data has been acquired for the request yet.
    #[error("no data for channel '{channel}' at resolution {resolution}")]
    NotAcquired {
        /// Channel name
        channel: String,
        /// Pyramid level
        resolution: u32,
    },

    /// Requested pyramid level does not exist.
    #[error("resolution {requested} out of range (max {max})")]
    ResolutionOutOfRange {
        /// Requested level
        requested: u32,
        /// Coarsest available level
        max: u32,
    },

    /// Sample buffer length does not match the region.
    #[error("sample count mismatch: expected {expected}, got {actual}")]
    SampleCount {
        /// Expected number of samples
        expected: usize,
        /// Actual number of samples
        actual: usize,
    },

    /// Tile dimensions the store cannot handle.
    #[error("invalid tile size: {width}x{height}")]
    InvalidTileSize {
        /// Tile width
        width: u32,
        /// Tile height
        height: u32,
    },

    /// Backend-specific failure.
    #[error("tile source error: {0}")]
    Source(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
