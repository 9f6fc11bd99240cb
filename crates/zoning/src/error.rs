//! Error types for the zoning pipeline

use thiserror::Error;

/// Error type for zoning operations.
///
/// `Validation` marks input that breaks a declared contract before any work
/// starts; `Processing` marks a pipeline invariant that could not be
/// satisfied at runtime (no valid pixels, no zones left, and so on). Both
/// abort the run. Degraded-but-usable situations are reported as `tracing`
/// warnings instead of errors.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or out-of-contract input
    #[error("validation error: {0}")]
    Validation(String),

    /// A pipeline stage could not produce a usable result
    #[error("processing error: {0}")]
    Processing(String),

    #[error(transparent)]
    Core(#[from] agrozone_core::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for zoning operations
pub type Result<T> = std::result::Result<T, Error>;
