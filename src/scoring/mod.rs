//! Conversion of per-tile blobs into globally positioned, scored candidates.
//!
//! A blob's confidence is the mean response inside its disk, divided by 255.
//! The disk is clipped to the response map; samples outside it are skipped,
//! never wrapped around.

use std::f32::consts::SQRT_2;

use crate::candidate::Candidate;
use crate::grid::{Padding, TilePlacement};
use crate::image::ImageView;
use crate::model::Blob;
use crate::util::math::clip;
use crate::util::{TileDetectError, TileDetectResult};

/// Radius bounds applied to every candidate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RadiusRange {
    pub min_r: f32,
    pub max_r: f32,
}

impl Default for RadiusRange {
    fn default() -> Self {
        Self {
            min_r: 5.0,
            max_r: 14.0,
        }
    }
}

/// Blob radius from its scale: `clip(sigma * sqrt(2), min_r, max_r)`.
pub fn blob_radius(sigma: f32, range: RadiusRange) -> f32 {
    clip(sigma * SQRT_2, range.min_r, range.max_r)
}

/// Mean response over the in-bounds disk of integer radius `r_i`, over 255.
///
/// Returns 0 when the disk has no in-bounds sample.
pub fn disk_confidence(response: ImageView<'_, f32>, row: usize, col: usize, r_i: usize) -> f32 {
    let r = r_i as i64;
    let r2 = r * r;
    let (row, col) = (row as i64, col as i64);
    let y0 = (row - r).max(0);
    let y1 = (row + r).min(response.height() as i64 - 1);
    let x0 = (col - r).max(0);
    let x1 = (col + r).min(response.width() as i64 - 1);

    let mut sum = 0.0f64;
    let mut count = 0usize;
    for y in y0..=y1 {
        let Some(samples) = response.row(y as usize) else {
            continue;
        };
        let dy = y - row;
        for x in x0..=x1 {
            let dx = x - col;
            if dx * dx + dy * dy > r2 {
                continue;
            }
            sum += f64::from(samples[x as usize]);
            count += 1;
        }
    }

    if count == 0 {
        return 0.0;
    }
    clip((sum / count as f64 / 255.0) as f32, 0.0, 1.0)
}

/// Rejects response maps whose shape differs from the tile that produced them.
pub fn check_response_shape(
    tile: usize,
    width: usize,
    height: usize,
    response: ImageView<'_, f32>,
) -> TileDetectResult<()> {
    if response.width() != width || response.height() != height {
        return Err(TileDetectError::ResponseShapeMismatch {
            tile,
            width,
            height,
            got_width: response.width(),
            got_height: response.height(),
        });
    }
    Ok(())
}

/// Scores the blobs of one tile and maps them to original-image coordinates.
///
/// Output order follows `blobs`.
pub fn score_blobs(
    blobs: &[Blob],
    response: ImageView<'_, f32>,
    placement: TilePlacement,
    padding: Padding,
    range: RadiusRange,
) -> Vec<Candidate> {
    blobs
        .iter()
        .map(|blob| {
            let r = blob_radius(blob.sigma, range);
            let r_i = r.max(0.0).floor() as usize;
            let confidence = disk_confidence(response, blob.row, blob.col, r_i);
            Candidate {
                x: (blob.col + placement.col) as i64 - padding.left as i64,
                y: (blob.row + placement.row) as i64 - padding.top as i64,
                r,
                confidence,
            }
        })
        .collect()
}
