//! Collaborator interfaces: tile classification and blob extraction.
//!
//! The detector only depends on the two traits below. The production
//! classifier is a dense pixel-classification network living outside this
//! crate; `PassthroughClassifier` and `LogBlobExtractor` are reference
//! implementations used by the CLI and for working on precomputed responses.

use crate::image::{ImageView, ResponseMap};

mod log;
mod passthrough;

pub use log::LogBlobExtractor;
pub use passthrough::PassthroughClassifier;

/// Error type returned by classifier implementations.
pub type ClassifierError = Box<dyn std::error::Error + Send + Sync>;

/// Turns a tile of intensities into a response map of the same shape.
///
/// Implementations must be pure and deterministic and return values in
/// `0..=255`. They may be called from several worker threads at once.
pub trait TileClassifier: Sync {
    fn classify(&self, tile: ImageView<'_, u8>) -> Result<ResponseMap, ClassifierError>;
}

impl<F> TileClassifier for F
where
    F: Fn(ImageView<'_, u8>) -> Result<ResponseMap, ClassifierError> + Sync,
{
    fn classify(&self, tile: ImageView<'_, u8>) -> Result<ResponseMap, ClassifierError> {
        self(tile)
    }
}

/// Scale-space search parameters handed to a [`BlobExtractor`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlobParams {
    /// Smallest Gaussian sigma sampled.
    pub min_sigma: f32,
    /// Largest Gaussian sigma sampled.
    pub max_sigma: f32,
    /// Number of linearly spaced sigma samples in `[min_sigma, max_sigma]`.
    pub num_sigma: usize,
    /// Absolute lower bound for scale-space maxima.
    pub threshold: f32,
}

impl Default for BlobParams {
    fn default() -> Self {
        Self {
            min_sigma: 3.0,
            max_sigma: 15.0,
            num_sigma: 15,
            threshold: 0.1,
        }
    }
}

/// One scale-space maximum in tile-local coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Blob {
    pub row: usize,
    pub col: usize,
    pub sigma: f32,
}

/// Finds blob-like local maxima in a response map.
pub trait BlobExtractor: Sync {
    fn find_blobs(&self, response: ImageView<'_, f32>, params: &BlobParams) -> Vec<Blob>;
}

impl<F> BlobExtractor for F
where
    F: Fn(ImageView<'_, f32>, &BlobParams) -> Vec<Blob> + Sync,
{
    fn find_blobs(&self, response: ImageView<'_, f32>, params: &BlobParams) -> Vec<Blob> {
        self(response, params)
    }
}
