//! Error types for tiledetect.

use thiserror::Error;

/// Result alias for tiledetect operations.
pub type TileDetectResult<T> = std::result::Result<T, TileDetectError>;

/// Errors that can occur while tiling, scoring, or deduplicating detections.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum TileDetectError {
    /// A configuration value is out of range or inconsistent with another one.
    #[error("invalid configuration `{field}`: {reason}")]
    InvalidConfig {
        field: &'static str,
        reason: &'static str,
    },
    /// Image or buffer dimensions are zero or overflow.
    #[error("invalid dimensions {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },
    /// Row stride is smaller than the row width.
    #[error("invalid stride {stride} for width {width}")]
    InvalidStride { width: usize, stride: usize },
    /// The backing buffer cannot hold the requested view.
    #[error("buffer too small: needed {needed}, got {got}")]
    BufferTooSmall { needed: usize, got: usize },
    /// A classifier returned a response map that does not match its tile.
    #[error(
        "response map for tile {tile} is {got_width}x{got_height}, expected {width}x{height}"
    )]
    ResponseShapeMismatch {
        tile: usize,
        width: usize,
        height: usize,
        got_width: usize,
        got_height: usize,
    },
    /// The tile classifier failed; the whole run is aborted.
    #[error("classifier failed on tile {tile} at ({row}, {col}) after {attempts} attempt(s): {reason}")]
    ClassifierFailed {
        tile: usize,
        row: usize,
        col: usize,
        attempts: u32,
        reason: String,
    },
    /// The run was cancelled through its cancel token.
    #[error("detection cancelled")]
    Cancelled,
    /// Image decoding failed.
    #[error("image io error: {reason}")]
    ImageIo { reason: String },
    /// Writing an export failed.
    #[error("io error: {reason}")]
    Io { reason: String },
}

impl From<std::io::Error> for TileDetectError {
    fn from(err: std::io::Error) -> Self {
        TileDetectError::Io {
            reason: err.to_string(),
        }
    }
}
