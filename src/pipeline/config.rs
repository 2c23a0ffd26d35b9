//! Detector configuration.

use crate::candidate::dedup::{DedupConfig, SelfMatchPolicy};
use crate::grid::TileGeometry;
use crate::model::BlobParams;
use crate::scoring::RadiusRange;
use crate::util::{TileDetectError, TileDetectResult};

/// How often a failing tile classification is attempted before the run fails.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per tile, at least 1.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 1 }
    }
}

/// Full configuration of a detection run.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectConfig {
    /// Vertical tile step.
    pub stride_rows: usize,
    /// Horizontal tile step.
    pub stride_cols: usize,
    /// Tile height, conventionally `2 * stride_rows`.
    pub window_rows: usize,
    /// Tile width, conventionally `2 * stride_cols`.
    pub window_cols: usize,
    /// Minimum candidate radius.
    pub min_r: f32,
    /// Maximum candidate radius.
    pub max_r: f32,
    /// Blob extractor: smallest sigma.
    pub min_sigma: f32,
    /// Blob extractor: largest sigma.
    pub max_sigma: f32,
    /// Blob extractor: number of sigma samples.
    pub num_sigma: usize,
    /// Blob extractor: absolute threshold for scale-space maxima.
    pub threshold: f32,
    /// Border margin in pixels for pruning.
    pub border: i64,
    /// Allowed disk overlap in pixels before merging.
    pub overlap_tolerance: f32,
    /// Minimum averaged cluster confidence.
    pub pred_tolerance: f32,
    /// Expected redundant observations per defect (4 for tiled detection).
    pub detect_samples: usize,
    pub self_match: SelfMatchPolicy,
    /// Process tiles on the rayon pool (requires the `rayon` feature).
    pub parallel: bool,
    pub retry: RetryPolicy,
}

impl Default for DetectConfig {
    fn default() -> Self {
        let geometry = TileGeometry::default();
        let blob = BlobParams::default();
        let radius = RadiusRange::default();
        let dedup = DedupConfig::default();
        Self {
            stride_rows: geometry.stride_rows,
            stride_cols: geometry.stride_cols,
            window_rows: geometry.window_rows,
            window_cols: geometry.window_cols,
            min_r: radius.min_r,
            max_r: radius.max_r,
            min_sigma: blob.min_sigma,
            max_sigma: blob.max_sigma,
            num_sigma: blob.num_sigma,
            threshold: blob.threshold,
            border: dedup.border,
            overlap_tolerance: dedup.overlap_tolerance,
            pred_tolerance: dedup.pred_tolerance,
            detect_samples: dedup.detect_samples,
            self_match: dedup.self_match,
            parallel: false,
            retry: RetryPolicy::default(),
        }
    }
}

impl DetectConfig {
    /// Sets the stride and the conventional `2 * stride` window.
    pub fn with_stride(mut self, stride_rows: usize, stride_cols: usize) -> Self {
        let geometry = TileGeometry::from_stride(stride_rows, stride_cols);
        self.stride_rows = geometry.stride_rows;
        self.stride_cols = geometry.stride_cols;
        self.window_rows = geometry.window_rows;
        self.window_cols = geometry.window_cols;
        self
    }

    pub fn geometry(&self) -> TileGeometry {
        TileGeometry {
            window_rows: self.window_rows,
            window_cols: self.window_cols,
            stride_rows: self.stride_rows,
            stride_cols: self.stride_cols,
        }
    }

    pub fn blob_params(&self) -> BlobParams {
        BlobParams {
            min_sigma: self.min_sigma,
            max_sigma: self.max_sigma,
            num_sigma: self.num_sigma,
            threshold: self.threshold,
        }
    }

    pub fn radius_range(&self) -> RadiusRange {
        RadiusRange {
            min_r: self.min_r,
            max_r: self.max_r,
        }
    }

    pub fn dedup(&self) -> DedupConfig {
        DedupConfig {
            border: self.border,
            overlap_tolerance: self.overlap_tolerance,
            pred_tolerance: self.pred_tolerance,
            detect_samples: self.detect_samples,
            self_match: self.self_match,
        }
    }

    /// Validates every parameter; called before any tiling happens.
    pub fn validate(&self) -> TileDetectResult<()> {
        self.geometry().validate()?;
        if !(self.min_r.is_finite() && self.min_r >= 0.0) {
            return Err(TileDetectError::InvalidConfig {
                field: "min_r",
                reason: "must be finite and non-negative",
            });
        }
        if !self.max_r.is_finite() || self.min_r > self.max_r {
            return Err(TileDetectError::InvalidConfig {
                field: "max_r",
                reason: "must be finite and at least min_r",
            });
        }
        if self.num_sigma < 1 {
            return Err(TileDetectError::InvalidConfig {
                field: "num_sigma",
                reason: "must be at least 1",
            });
        }
        if !(self.min_sigma.is_finite() && self.min_sigma > 0.0) {
            return Err(TileDetectError::InvalidConfig {
                field: "min_sigma",
                reason: "must be finite and positive",
            });
        }
        if !self.max_sigma.is_finite() || self.min_sigma > self.max_sigma {
            return Err(TileDetectError::InvalidConfig {
                field: "max_sigma",
                reason: "must be finite and at least min_sigma",
            });
        }
        if !self.threshold.is_finite() {
            return Err(TileDetectError::InvalidConfig {
                field: "threshold",
                reason: "must be finite",
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(TileDetectError::InvalidConfig {
                field: "retry.max_attempts",
                reason: "must be at least 1",
            });
        }
        self.dedup().validate()
    }
}
