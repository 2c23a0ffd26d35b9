//! Low-level building blocks for custom detection pipelines.
//!
//! These expose the individual stages behind `Detector` for callers that
//! schedule tiles themselves (for example on a GPU batch queue) and only need
//! the geometry, scoring, and merge steps.

pub use crate::candidate::dedup::{merge_redundant, prune_artifacts, MergeOutcome, NOISE_FLOOR};
pub use crate::grid::Tile;
pub use crate::scoring::{
    blob_radius, check_response_shape, disk_confidence, score_blobs, RadiusRange,
};
