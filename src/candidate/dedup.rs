//! Two-pass pruning and merging of per-tile candidates.
//!
//! Pass 1 drops candidates near the image border (mostly padding artifacts)
//! and candidates below a fixed noise floor. Pass 2 groups candidates whose
//! disks overlap by more than `overlap_tolerance` pixels. Because tiles
//! overlap with `window = 2 * stride`, a real defect is expected to show up
//! `detect_samples` times; each cluster's confidence is the mean of its best
//! `detect_samples` members, zero-padded, so under-observed detections are
//! penalised.

use crate::candidate::{Candidate, DetectionResult};
use crate::trace::{trace_event, trace_span};
use crate::util::math::mean;
use crate::util::{TileDetectError, TileDetectResult};

/// Candidates with confidence below this value are always pruned.
pub const NOISE_FLOOR: f32 = 0.01;

/// How the anchor candidate's match against itself enters its cluster.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SelfMatchPolicy {
    /// The anchor appears once in its cluster.
    #[default]
    CountOnce,
    /// The anchor appears twice: once as seed and once as its own neighbour,
    /// doubling its weight in the cluster average.
    CountTwice,
}

/// Parameters for [`discriminate`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DedupConfig {
    /// Candidates within this many pixels of an edge are pruned.
    pub border: i64,
    /// Allowed disk overlap, in pixels, before two candidates are merged.
    pub overlap_tolerance: f32,
    /// Clusters whose averaged confidence is below this are discarded.
    pub pred_tolerance: f32,
    /// Expected number of redundant observations per defect.
    pub detect_samples: usize,
    pub self_match: SelfMatchPolicy,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            border: 3,
            overlap_tolerance: 2.0,
            pred_tolerance: 0.33,
            detect_samples: 4,
            self_match: SelfMatchPolicy::CountOnce,
        }
    }
}

impl DedupConfig {
    /// Settings for re-discriminating an already deduplicated list.
    pub fn rediscrimination() -> Self {
        Self {
            detect_samples: 1,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> TileDetectResult<()> {
        if self.border < 0 {
            return Err(TileDetectError::InvalidConfig {
                field: "border",
                reason: "must be non-negative",
            });
        }
        if self.detect_samples == 0 {
            return Err(TileDetectError::InvalidConfig {
                field: "detect_samples",
                reason: "must be at least 1",
            });
        }
        if !self.overlap_tolerance.is_finite() {
            return Err(TileDetectError::InvalidConfig {
                field: "overlap_tolerance",
                reason: "must be finite",
            });
        }
        if !self.pred_tolerance.is_finite() {
            return Err(TileDetectError::InvalidConfig {
                field: "pred_tolerance",
                reason: "must be finite",
            });
        }
        Ok(())
    }
}

/// Pass 1: drops border artifacts and sub-floor noise, preserving order.
///
/// The leading edges are asymmetric: `x <= border` is pruned but only
/// `y < border`.
pub fn prune_artifacts(
    candidates: &[Candidate],
    width: usize,
    height: usize,
    border: i64,
) -> Vec<Candidate> {
    let width = width as i64;
    let height = height as i64;
    candidates
        .iter()
        .filter(|c| {
            let near_border = c.x <= border
                || c.x >= width - border
                || c.y < border
                || c.y >= height - border;
            !near_border && c.confidence >= NOISE_FLOOR
        })
        .copied()
        .collect()
}

/// Builds the cluster anchored at `anchor` and scores it.
///
/// Every candidate (including already consumed ones and the anchor itself)
/// is tested against the anchor; matches are marked in `consumed`. Returns
/// the highest-confidence member and the zero-padded mean of the best
/// `detect_samples` confidences.
fn merge_cluster(
    pruned: &[Candidate],
    anchor: usize,
    cfg: &DedupConfig,
    consumed: &mut [bool],
) -> (Candidate, f32) {
    let seed = pruned[anchor];
    let mut cluster = vec![seed];
    for (j, other) in pruned.iter().enumerate() {
        if seed.distance(other) >= seed.r + other.r - cfg.overlap_tolerance {
            continue;
        }
        consumed[j] = true;
        if j == anchor && cfg.self_match == SelfMatchPolicy::CountOnce {
            continue;
        }
        cluster.push(*other);
    }

    // Stable: ties keep input order.
    cluster.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    cluster.truncate(cfg.detect_samples);

    let sum: f32 = cluster.iter().map(|c| c.confidence).sum();
    let avg = sum / cfg.detect_samples as f32;
    (cluster.first().copied().unwrap_or(seed), avg)
}

/// Output of the merge pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MergeOutcome {
    /// Accepted candidates, confidence replaced by the cluster average.
    pub accepted: Vec<Candidate>,
    /// Cluster averages of the accepted candidates, same order.
    pub averages: Vec<f32>,
    /// Clusters formed, accepted or discarded.
    pub clusters: usize,
}

/// Pass 2: merges redundant detections in input order.
///
/// Fails with [`TileDetectError::InvalidConfig`] before touching any
/// candidate if `cfg` does not validate.
pub fn merge_redundant(pruned: &[Candidate], cfg: &DedupConfig) -> TileDetectResult<MergeOutcome> {
    cfg.validate()?;
    let mut consumed = vec![false; pruned.len()];
    let mut accepted = Vec::new();
    let mut averages = Vec::new();
    let mut clusters = 0usize;

    for i in 0..pruned.len() {
        if consumed[i] {
            continue;
        }
        let (best, avg) = merge_cluster(pruned, i, cfg, &mut consumed);
        clusters += 1;
        if avg < cfg.pred_tolerance {
            continue;
        }
        accepted.push(Candidate {
            confidence: avg.clamp(0.0, 1.0),
            ..best
        });
        averages.push(avg);
    }

    Ok(MergeOutcome {
        accepted,
        averages,
        clusters,
    })
}

/// Assembles the final result from the merge pass output.
pub(crate) fn finish(raw_count: usize, pruned_count: usize, merged: MergeOutcome) -> DetectionResult {
    let MergeOutcome {
        accepted: candidates,
        averages,
        clusters: cluster_count,
    } = merged;
    let aggregate_confidence = mean(&averages).unwrap_or(0.0);
    trace_event!(
        "clusters",
        formed = cluster_count,
        accepted = candidates.len(),
        aggregate = aggregate_confidence
    );
    DetectionResult {
        candidates,
        aggregate_confidence,
        raw_count,
        pruned_count,
        cluster_count,
    }
}

/// Runs both passes over `candidates` for an image of `width x height`.
///
/// `candidates` must be in a fixed order (row-major tile scan, then extractor
/// order) for the output to be reproducible. Use `detect_samples = 1` (see
/// [`DedupConfig::rediscrimination`]) to re-filter an already merged list.
pub fn discriminate(
    candidates: &[Candidate],
    width: usize,
    height: usize,
    cfg: &DedupConfig,
) -> TileDetectResult<DetectionResult> {
    cfg.validate()?;
    let _span = trace_span!("dedup", raw = candidates.len()).entered();

    let pruned = prune_artifacts(candidates, width, height, cfg.border);
    trace_event!("pruned_candidates", count = pruned.len());

    let merged = merge_redundant(&pruned, cfg)?;
    Ok(finish(candidates.len(), pruned.len(), merged))
}
