//! Defect candidates and their redundancy-aware deduplication.

pub mod dedup;
mod result;

pub use result::DetectionResult;

/// One detected defect center in original-image coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Candidate {
    /// Column in the original (unpadded) image.
    pub x: i64,
    /// Row in the original (unpadded) image.
    pub y: i64,
    /// Blob radius in pixels.
    pub r: f32,
    /// Calibrated confidence in `[0, 1]`.
    pub confidence: f32,
}

impl Candidate {
    /// Euclidean distance between the two centers.
    pub fn distance(&self, other: &Candidate) -> f32 {
        crate::util::math::hypot_i64(self.x - other.x, self.y - other.y)
    }
}
