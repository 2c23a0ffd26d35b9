//! Laplacian-of-Gaussian scale-space blob extractor.
//!
//! For each sampled sigma the response is smoothed with a separable Gaussian
//! (truncated at 4 sigma, reflected borders), the 5-point Laplacian is taken
//! and scaled by `-sigma^2` so that bright blobs give positive, scale-normalized
//! values. Blobs are the 3x3x3 local maxima of that stack above `threshold`;
//! blobs overlapping a larger-scale blob by more than `overlap` are dropped.

use std::cmp::Ordering;
use std::f32::consts::{PI, SQRT_2};

use crate::image::ImageView;
use crate::model::{Blob, BlobExtractor, BlobParams};
use crate::util::math::linspace;

/// Multi-scale LoG blob finder.
#[derive(Clone, Copy, Debug)]
pub struct LogBlobExtractor {
    /// Maximum allowed area overlap (fraction of the smaller disk) between
    /// two reported blobs; the smaller-scale one is removed above it.
    pub overlap: f32,
}

impl Default for LogBlobExtractor {
    fn default() -> Self {
        Self { overlap: 0.5 }
    }
}

#[derive(Clone, Copy, Debug)]
struct ScalePeak {
    blob: Blob,
    value: f32,
}

fn peak_cmp_desc(a: &ScalePeak, b: &ScalePeak) -> Ordering {
    b.value
        .total_cmp(&a.value)
        .then_with(|| a.blob.row.cmp(&b.blob.row))
        .then_with(|| a.blob.col.cmp(&b.blob.col))
        .then_with(|| a.blob.sigma.total_cmp(&b.blob.sigma))
}

impl BlobExtractor for LogBlobExtractor {
    fn find_blobs(&self, response: ImageView<'_, f32>, params: &BlobParams) -> Vec<Blob> {
        let width = response.width();
        let height = response.height();
        let sigmas = linspace(params.min_sigma, params.max_sigma, params.num_sigma);
        if sigmas.is_empty() {
            return Vec::new();
        }

        let src = contiguous(response);
        let stack: Vec<Vec<f32>> = sigmas
            .iter()
            .map(|&sigma| normalized_log(&src, width, height, sigma))
            .collect();

        let mut peaks = Vec::new();
        for (s, layer) in stack.iter().enumerate() {
            for y in 0..height {
                for x in 0..width {
                    let value = layer[y * width + x];
                    if value > params.threshold && is_local_max(&stack, width, height, s, x, y) {
                        peaks.push(ScalePeak {
                            blob: Blob {
                                row: y,
                                col: x,
                                sigma: sigmas[s],
                            },
                            value,
                        });
                    }
                }
            }
        }
        peaks.sort_by(peak_cmp_desc);

        prune_overlapping(&peaks, self.overlap)
    }
}

fn contiguous(view: ImageView<'_, f32>) -> Vec<f32> {
    let mut out = Vec::with_capacity(view.width() * view.height());
    for y in 0..view.height() {
        if let Some(row) = view.row(y) {
            out.extend_from_slice(row);
        }
    }
    out
}

/// Half-sample symmetric index reflection (`d c b a | a b c d | d c b a`).
fn reflect(i: isize, n: usize) -> usize {
    let n = n as isize;
    let period = 2 * n;
    let m = i.rem_euclid(period);
    if m >= n {
        (period - 1 - m) as usize
    } else {
        m as usize
    }
}

fn gaussian_kernel(sigma: f32) -> Vec<f32> {
    let radius = (4.0 * sigma).ceil().max(1.0) as isize;
    let denom = 2.0 * sigma * sigma;
    let mut kernel: Vec<f32> = (-radius..=radius)
        .map(|i| (-((i * i) as f32) / denom).exp())
        .collect();
    let sum: f32 = kernel.iter().sum();
    for k in kernel.iter_mut() {
        *k /= sum;
    }
    kernel
}

fn blur(src: &[f32], width: usize, height: usize, sigma: f32) -> Vec<f32> {
    let kernel = gaussian_kernel(sigma);
    let radius = (kernel.len() / 2) as isize;

    let mut tmp = vec![0.0f32; src.len()];
    for y in 0..height {
        let row = &src[y * width..(y + 1) * width];
        for x in 0..width {
            let mut acc = 0.0f32;
            for (k, &w) in kernel.iter().enumerate() {
                acc += w * row[reflect(x as isize + k as isize - radius, width)];
            }
            tmp[y * width + x] = acc;
        }
    }

    let mut out = vec![0.0f32; src.len()];
    for y in 0..height {
        for x in 0..width {
            let mut acc = 0.0f32;
            for (k, &w) in kernel.iter().enumerate() {
                let sy = reflect(y as isize + k as isize - radius, height);
                acc += w * tmp[sy * width + x];
            }
            out[y * width + x] = acc;
        }
    }
    out
}

fn normalized_log(src: &[f32], width: usize, height: usize, sigma: f32) -> Vec<f32> {
    let smooth = blur(src, width, height, sigma);
    let scale = -(sigma * sigma);
    let at = |x: isize, y: isize| smooth[reflect(y, height) * width + reflect(x, width)];

    let mut out = vec![0.0f32; src.len()];
    for y in 0..height as isize {
        for x in 0..width as isize {
            let lap = at(x - 1, y) + at(x + 1, y) + at(x, y - 1) + at(x, y + 1) - 4.0 * at(x, y);
            out[y as usize * width + x as usize] = scale * lap;
        }
    }
    out
}

fn is_local_max(
    stack: &[Vec<f32>],
    width: usize,
    height: usize,
    s: usize,
    x: usize,
    y: usize,
) -> bool {
    let value = stack[s][y * width + x];
    let s0 = s.saturating_sub(1);
    let s1 = (s + 1).min(stack.len() - 1);
    let y0 = y.saturating_sub(1);
    let y1 = (y + 1).min(height - 1);
    let x0 = x.saturating_sub(1);
    let x1 = (x + 1).min(width - 1);
    for layer in &stack[s0..=s1] {
        for ny in y0..=y1 {
            for nx in x0..=x1 {
                if layer[ny * width + nx] > value {
                    return false;
                }
            }
        }
    }
    true
}

/// Fraction of the smaller disk covered by the intersection of two disks.
fn disk_overlap(d: f32, r1: f32, r2: f32) -> f32 {
    if d > r1 + r2 {
        return 0.0;
    }
    if d <= (r1 - r2).abs() {
        return 1.0;
    }
    let ratio1 = ((d * d + r1 * r1 - r2 * r2) / (2.0 * d * r1)).clamp(-1.0, 1.0);
    let ratio2 = ((d * d + r2 * r2 - r1 * r1) / (2.0 * d * r2)).clamp(-1.0, 1.0);
    let a = -d + r2 + r1;
    let b = d - r2 + r1;
    let c = d + r2 - r1;
    let e = d + r2 + r1;
    let area = r1 * r1 * ratio1.acos() + r2 * r2 * ratio2.acos() - 0.5 * (a * b * c * e).abs().sqrt();
    area / (PI * r1.min(r2).powi(2))
}

fn prune_overlapping(peaks: &[ScalePeak], overlap: f32) -> Vec<Blob> {
    let mut removed = vec![false; peaks.len()];
    for i in 0..peaks.len() {
        for j in (i + 1)..peaks.len() {
            if removed[i] || removed[j] {
                continue;
            }
            let a = peaks[i].blob;
            let b = peaks[j].blob;
            let dy = a.row as f32 - b.row as f32;
            let dx = a.col as f32 - b.col as f32;
            let d = dx.hypot(dy);
            if disk_overlap(d, a.sigma * SQRT_2, b.sigma * SQRT_2) > overlap {
                if a.sigma > b.sigma {
                    removed[j] = true;
                } else {
                    removed[i] = true;
                }
            }
        }
    }

    peaks
        .iter()
        .zip(removed)
        .filter_map(|(peak, gone)| (!gone).then_some(peak.blob))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{disk_overlap, reflect, LogBlobExtractor};
    use crate::model::{BlobExtractor, BlobParams};
    use crate::ImageView;

    #[test]
    fn reflect_mirrors_edges() {
        assert_eq!(reflect(-1, 5), 0);
        assert_eq!(reflect(-2, 5), 1);
        assert_eq!(reflect(5, 5), 4);
        assert_eq!(reflect(6, 5), 3);
        assert_eq!(reflect(2, 5), 2);
    }

    #[test]
    fn disk_overlap_limits() {
        assert_eq!(disk_overlap(10.0, 2.0, 2.0), 0.0);
        assert_eq!(disk_overlap(0.5, 4.0, 2.0), 1.0);
        let half = disk_overlap(2.0, 2.0, 2.0);
        assert!(half > 0.0 && half < 1.0);
    }

    #[test]
    fn finds_single_gaussian_spot() {
        let width = 48;
        let height = 48;
        let (cx, cy, s) = (20.0f32, 27.0f32, 3.0f32);
        let mut data = vec![0.0f32; width * height];
        for y in 0..height {
            for x in 0..width {
                let dx = x as f32 - cx;
                let dy = y as f32 - cy;
                data[y * width + x] = 255.0 * (-(dx * dx + dy * dy) / (2.0 * s * s)).exp();
            }
        }
        let view = ImageView::from_slice(&data, width, height).unwrap();
        let params = BlobParams {
            min_sigma: 1.0,
            max_sigma: 6.0,
            num_sigma: 6,
            threshold: 1.0,
        };
        let blobs = LogBlobExtractor::default().find_blobs(view, &params);
        assert_eq!(blobs.len(), 1, "blobs: {blobs:?}");
        assert_eq!((blobs[0].row, blobs[0].col), (27, 20));
        assert!((blobs[0].sigma - 3.0).abs() <= 1.0);
    }

    #[test]
    fn flat_response_has_no_blobs() {
        let data = vec![100.0f32; 32 * 32];
        let view = ImageView::from_slice(&data, 32, 32).unwrap();
        let blobs = LogBlobExtractor::default().find_blobs(view, &BlobParams::default());
        assert!(blobs.is_empty());
    }
}
