//! Small numeric helpers shared by scoring and deduplication.

/// Clamps `value` into `[lo, hi]`; `lo` wins if the bounds are inverted.
pub(crate) fn clip(value: f32, lo: f32, hi: f32) -> f32 {
    value.min(hi).max(lo)
}

/// Arithmetic mean of a slice, or `None` if it is empty.
pub(crate) fn mean(values: &[f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    let sum: f64 = values.iter().map(|&v| v as f64).sum();
    Some((sum / values.len() as f64) as f32)
}

/// `count` linearly spaced samples covering `[start, end]` inclusively.
pub(crate) fn linspace(start: f32, end: f32, count: usize) -> Vec<f32> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (count - 1) as f32;
            (0..count).map(|i| start + step * i as f32).collect()
        }
    }
}

/// Euclidean distance between two integer points.
pub(crate) fn hypot_i64(dx: i64, dy: i64) -> f32 {
    (dx as f64).hypot(dy as f64) as f32
}

#[cfg(test)]
mod tests {
    use super::{clip, hypot_i64, linspace, mean};

    #[test]
    fn clip_respects_bounds() {
        assert_eq!(clip(3.0, 5.0, 14.0), 5.0);
        assert_eq!(clip(20.0, 5.0, 14.0), 14.0);
        assert_eq!(clip(7.5, 5.0, 14.0), 7.5);
    }

    #[test]
    fn mean_of_empty_is_none() {
        assert!(mean(&[]).is_none());
        let m = mean(&[0.9, 0.8, 0.7, 0.6]).unwrap();
        assert!((m - 0.75).abs() < 1e-6);
    }

    #[test]
    fn linspace_includes_endpoints() {
        let s = linspace(3.0, 15.0, 13);
        assert_eq!(s.len(), 13);
        assert!((s[0] - 3.0).abs() < 1e-6);
        assert!((s[12] - 15.0).abs() < 1e-5);
        assert_eq!(linspace(2.0, 9.0, 1), vec![2.0]);
    }

    #[test]
    fn hypot_matches_pythagoras() {
        assert!((hypot_i64(3, -4) - 5.0).abs() < 1e-6);
    }
}
