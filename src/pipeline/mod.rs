//! Tiled detection pipeline.
//!
//! `Detector` validates its configuration, lays out the padded tile grid,
//! classifies every tile, extracts and scores blobs, and finally runs the
//! two-pass deduplication over all candidates in row-major tile order.
//! Classifier failure on any tile fails the whole run; no partial result is
//! returned.

mod config;
mod progress;

pub use config::{DetectConfig, RetryPolicy};
pub use progress::{CancelToken, ProgressSink};

use crate::candidate::dedup::{finish, merge_redundant, prune_artifacts, DedupConfig};
use crate::candidate::{Candidate, DetectionResult};
use crate::grid::{PaddedTileGrid, Tile, TilePlacement};
use crate::image::{ImageView, ResponseMap};
use crate::model::{BlobExtractor, LogBlobExtractor, PassthroughClassifier, TileClassifier};
use crate::scoring::{check_response_shape, score_blobs};
use crate::trace::{trace_debug, trace_event, trace_span, trace_warn};
use crate::util::{TileDetectError, TileDetectResult};
use progress::{checkpoint, Progress};
#[cfg(feature = "rayon")]
use rayon::prelude::*;
#[cfg(feature = "rayon")]
use std::sync::atomic::{AtomicUsize, Ordering};

/// Tiled defect detector over a classifier and a blob extractor.
pub struct Detector<C, B> {
    classifier: C,
    extractor: B,
    cfg: DetectConfig,
    progress: Option<Box<dyn ProgressSink + Send>>,
}

impl Default for Detector<PassthroughClassifier, LogBlobExtractor> {
    fn default() -> Self {
        Self::new(PassthroughClassifier, LogBlobExtractor::default())
    }
}

impl<C: TileClassifier, B: BlobExtractor> Detector<C, B> {
    /// Creates a detector with the default configuration.
    pub fn new(classifier: C, extractor: B) -> Self {
        Self {
            classifier,
            extractor,
            cfg: DetectConfig::default(),
            progress: None,
        }
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, cfg: DetectConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// Installs a progress sink invoked at the run checkpoints.
    pub fn with_progress<P>(mut self, sink: P) -> Self
    where
        P: ProgressSink + Send + 'static,
    {
        self.progress = Some(Box::new(sink));
        self
    }

    pub fn config(&self) -> &DetectConfig {
        &self.cfg
    }

    /// Runs detection over a full single-channel image.
    pub fn detect(&self, image: ImageView<'_, u8>) -> TileDetectResult<DetectionResult> {
        self.detect_with_cancel(image, &CancelToken::new())
    }

    /// Runs detection, checking `cancel` before each tile and between passes.
    pub fn detect_with_cancel(
        &self,
        image: ImageView<'_, u8>,
        cancel: &CancelToken,
    ) -> TileDetectResult<DetectionResult> {
        self.cfg.validate()?;
        let mut progress = Progress::new(self.progress.as_deref().map(|s| s as &dyn ProgressSink));
        progress.report(checkpoint::START);

        let _span = trace_span!("detect", width = image.width(), height = image.height()).entered();

        let grid = PaddedTileGrid::new(image.height(), image.width(), self.cfg.geometry())?;
        trace_event!(
            "tile_grid",
            rows = grid.rows(),
            cols = grid.cols(),
            padded_width = grid.padded_width(),
            padded_height = grid.padded_height()
        );
        progress.set_tiles(grid.len());
        progress.report(checkpoint::TILED);

        let raw = self.collect_candidates(image, &grid, cancel, &progress)?;
        trace_event!("raw_candidates", count = raw.len());
        progress.report(checkpoint::SCORED);

        let dedup = self.cfg.dedup();
        let _dedup_span = trace_span!("dedup", raw = raw.len()).entered();
        let pruned = prune_artifacts(&raw, image.width(), image.height(), dedup.border);
        trace_event!("pruned_candidates", count = pruned.len());
        progress.report(checkpoint::PRUNED);

        if cancel.is_cancelled() {
            return Err(TileDetectError::Cancelled);
        }

        let result = finish(raw.len(), pruned.len(), merge_redundant(&pruned, &dedup)?);
        progress.report(checkpoint::DONE);
        Ok(result)
    }

    /// Re-filters an already deduplicated list with `detect_samples = 1`.
    pub fn rediscriminate(
        &self,
        candidates: &[Candidate],
        width: usize,
        height: usize,
    ) -> TileDetectResult<DetectionResult> {
        let cfg = DedupConfig {
            detect_samples: 1,
            ..self.cfg.dedup()
        };
        crate::candidate::dedup::discriminate(candidates, width, height, &cfg)
    }

    #[cfg(feature = "rayon")]
    fn collect_candidates(
        &self,
        image: ImageView<'_, u8>,
        grid: &PaddedTileGrid,
        cancel: &CancelToken,
        progress: &Progress<'_>,
    ) -> TileDetectResult<Vec<Candidate>> {
        if !self.cfg.parallel {
            return self.collect_candidates_seq(image, grid, cancel, progress);
        }
        let _span = trace_span!("classify_tiles", tiles = grid.len(), parallel = true).entered();

        // Indexed collect keeps tile order, so dedup input matches the sequential run.
        // Tiles after the earliest failure seen so far are skipped; tiles before
        // it still run, so the reported error is the first one in tile order.
        let first_failure = AtomicUsize::new(usize::MAX);
        let placements: Vec<TilePlacement> = grid.placements().collect();
        let per_tile: Vec<TileDetectResult<Vec<Candidate>>> = placements
            .into_par_iter()
            .map(|placement| {
                if placement.index > first_failure.load(Ordering::Relaxed) {
                    return Ok(Vec::new());
                }
                let result = self.process_tile(image, grid, placement, cancel, progress);
                if result.is_err() {
                    first_failure.fetch_min(placement.index, Ordering::Relaxed);
                }
                result
            })
            .collect();

        let mut out = Vec::new();
        for tile in per_tile {
            out.extend(tile?);
        }
        Ok(out)
    }

    #[cfg(not(feature = "rayon"))]
    fn collect_candidates(
        &self,
        image: ImageView<'_, u8>,
        grid: &PaddedTileGrid,
        cancel: &CancelToken,
        progress: &Progress<'_>,
    ) -> TileDetectResult<Vec<Candidate>> {
        self.collect_candidates_seq(image, grid, cancel, progress)
    }

    fn collect_candidates_seq(
        &self,
        image: ImageView<'_, u8>,
        grid: &PaddedTileGrid,
        cancel: &CancelToken,
        progress: &Progress<'_>,
    ) -> TileDetectResult<Vec<Candidate>> {
        let _span = trace_span!("classify_tiles", tiles = grid.len()).entered();
        let mut out = Vec::new();
        for placement in grid.placements() {
            out.extend(self.process_tile(image, grid, placement, cancel, progress)?);
        }
        Ok(out)
    }

    fn process_tile(
        &self,
        image: ImageView<'_, u8>,
        grid: &PaddedTileGrid,
        placement: TilePlacement,
        cancel: &CancelToken,
        progress: &Progress<'_>,
    ) -> TileDetectResult<Vec<Candidate>> {
        if cancel.is_cancelled() {
            return Err(TileDetectError::Cancelled);
        }

        let tile = grid.extract_tile(image, placement)?;
        let response = self.classify_with_retry(&tile)?;
        check_response_shape(
            placement.index,
            tile.pixels.width(),
            tile.pixels.height(),
            response.view(),
        )?;

        let blobs = self
            .extractor
            .find_blobs(response.view(), &self.cfg.blob_params());
        let candidates = score_blobs(
            &blobs,
            response.view(),
            placement,
            grid.padding(),
            self.cfg.radius_range(),
        );
        trace_debug!(
            "tile_scored",
            tile = placement.index,
            row = placement.row,
            col = placement.col,
            blobs = blobs.len()
        );
        progress.tile_done();
        Ok(candidates)
    }

    fn classify_with_retry(&self, tile: &Tile) -> TileDetectResult<ResponseMap> {
        let max_attempts = self.cfg.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.classifier.classify(tile.pixels.view()) {
                Ok(response) => return Ok(response),
                Err(err) if attempt >= max_attempts => {
                    return Err(TileDetectError::ClassifierFailed {
                        tile: tile.placement.index,
                        row: tile.placement.row,
                        col: tile.placement.col,
                        attempts: attempt,
                        reason: err.to_string(),
                    });
                }
                Err(err) => {
                    let reason = err.to_string();
                    trace_warn!(
                        "classifier_retry",
                        tile = tile.placement.index,
                        attempt = attempt,
                        error = reason.as_str()
                    );
                    attempt += 1;
                }
            }
        }
    }
}
