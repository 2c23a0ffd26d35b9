//! tiledetect turns a full-resolution greyscale micrograph into a list of
//! defect candidates with calibrated confidence.
//!
//! The image is padded and cut into overlapping tiles (`window = 2 * stride`),
//! each tile is classified into a response map, blobs are extracted and scored
//! per tile, and a redundancy-aware deduplication pass collapses the repeated
//! sightings of each defect into one candidate. Tile processing can run in
//! parallel via the `rayon` feature.

pub mod candidate;
pub mod grid;
pub mod image;
pub mod lowlevel;
pub mod model;
pub mod pipeline;
pub mod scoring;
mod trace;
pub mod util;

#[cfg(feature = "image-io")]
pub use image::io;

pub use candidate::dedup::{discriminate, DedupConfig, SelfMatchPolicy};
pub use candidate::{Candidate, DetectionResult};
pub use grid::{PaddedTileGrid, Padding, TileGeometry, TilePlacement};
pub use image::{ImageView, OwnedImage, ResponseMap};
pub use model::{
    Blob, BlobExtractor, BlobParams, ClassifierError, LogBlobExtractor, PassthroughClassifier,
    TileClassifier,
};
pub use pipeline::{CancelToken, DetectConfig, Detector, ProgressSink, RetryPolicy};
pub use util::{TileDetectError, TileDetectResult};
