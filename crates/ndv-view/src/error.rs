//! Viewer error types.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for viewer operations.
pub type ViewResult<T> = Result<T, ViewError>;

/// Errors raised by the redraw pipeline and its configuration.
#[derive(Debug, Error)]
pub enum ViewError {
    /// The scheduler was shut down and accepts no more work.
    #[error("scheduler is closed")]
    SchedulerClosed,

    /// No configuration directory on this platform.
    #[error("no configuration directory available")]
    NoConfigDir,

    /// Configuration file could not be parsed.
    #[error("invalid config {path}: {source}")]
    ConfigParse {
        /// File that failed to parse
        path: PathBuf,
        /// Parser diagnostic
        source: ron::error::SpannedError,
    },

    /// Configuration could not be serialized.
    #[error("config serialization failed: {0}")]
    ConfigWrite(#[from] ron::Error),

    /// Configuration value out of range.
    #[error("invalid config value: {0}")]
    InvalidConfig(String),

    /// Channel display settings rejected the update.
    #[error(transparent)]
    Display(#[from] ndv_lut::LutError),

    /// Viewport could not be created.
    #[error(transparent)]
    Viewport(#[from] ndv_core::CoreError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
