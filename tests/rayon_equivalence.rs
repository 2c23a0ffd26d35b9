#![cfg(feature = "rayon")]

use std::sync::atomic::{AtomicUsize, Ordering};
use tiledetect::{
    Blob, BlobParams, ClassifierError, DetectConfig, Detector, ImageView, LogBlobExtractor,
    OwnedImage, PassthroughClassifier, ResponseMap, TileDetectError,
};

fn make_image(width: usize, height: usize) -> Vec<u8> {
    let centers = [(40.0f32, 52.0f32), (101.0, 77.0), (150.0, 30.0), (66.0, 140.0)];
    let mut data = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            let mut v = 0.0f32;
            for &(cx, cy) in &centers {
                let d2 = (x as f32 - cx).powi(2) + (y as f32 - cy).powi(2);
                v += 230.0 * (-d2 / 18.0).exp();
            }
            data.push(v.min(255.0) as u8);
        }
    }
    data
}

#[test]
fn parallel_matches_sequential() {
    let (width, height) = (180usize, 160usize);
    let data = make_image(width, height);
    let image = ImageView::from_slice(&data, width, height).unwrap();

    let base = DetectConfig {
        min_sigma: 2.0,
        max_sigma: 5.0,
        num_sigma: 4,
        threshold: 5.0,
        ..DetectConfig::default().with_stride(24, 24)
    };
    let seq = Detector::new(PassthroughClassifier, LogBlobExtractor::default())
        .with_config(DetectConfig {
            parallel: false,
            ..base.clone()
        })
        .detect(image)
        .unwrap();
    let par = Detector::new(PassthroughClassifier, LogBlobExtractor::default())
        .with_config(DetectConfig {
            parallel: true,
            ..base
        })
        .detect(image)
        .unwrap();

    assert_eq!(seq, par);
    assert!(!seq.is_empty());
}

fn marked_image(width: usize, height: usize, marks: &[(usize, usize)]) -> Vec<u8> {
    let mut data = vec![0u8; width * height];
    for &(x, y) in marks {
        data[y * width + x] = 255;
    }
    data
}

fn failing_on_marks(
    calls: &AtomicUsize,
) -> impl Fn(ImageView<'_, u8>) -> Result<ResponseMap, ClassifierError> + Sync + '_ {
    move |tile: ImageView<'_, u8>| -> Result<ResponseMap, ClassifierError> {
        calls.fetch_add(1, Ordering::SeqCst);
        if tile.as_slice().contains(&255) {
            return Err("model crashed".into());
        }
        Ok(OwnedImage::from_view(tile)?.to_response())
    }
}

fn no_blobs(_response: ImageView<'_, f32>, _params: &BlobParams) -> Vec<Blob> {
    Vec::new()
}

#[test]
fn parallel_failure_stops_scheduling_later_tiles() {
    let (width, height) = (64usize, 64usize);
    // The mark at (0, 0) lies in tile 0; one worker visits tiles in order.
    let data = marked_image(width, height, &[(0, 0)]);
    let image = ImageView::from_slice(&data, width, height).unwrap();
    let calls = AtomicUsize::new(0);
    let detector = Detector::new(failing_on_marks(&calls), no_blobs).with_config(DetectConfig {
        parallel: true,
        ..DetectConfig::default().with_stride(8, 8)
    });

    let pool = rayon::ThreadPoolBuilder::new().num_threads(1).build().unwrap();
    let err = pool.install(|| detector.detect(image)).unwrap_err();

    assert!(matches!(err, TileDetectError::ClassifierFailed { tile: 0, .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn parallel_failure_reports_first_tile_in_order() {
    let (width, height) = (64usize, 64usize);
    // Both marks fail some tiles; (20, 20) fails earlier ones than (63, 63).
    let data = marked_image(width, height, &[(63, 63), (20, 20)]);
    let image = ImageView::from_slice(&data, width, height).unwrap();
    let calls = AtomicUsize::new(0);
    let cfg = DetectConfig::default().with_stride(8, 8);

    let seq = Detector::new(failing_on_marks(&calls), no_blobs)
        .with_config(DetectConfig {
            parallel: false,
            ..cfg.clone()
        })
        .detect(image)
        .unwrap_err();
    for _ in 0..5 {
        let par = Detector::new(failing_on_marks(&calls), no_blobs)
            .with_config(DetectConfig {
                parallel: true,
                ..cfg.clone()
            })
            .detect(image)
            .unwrap_err();
        assert_eq!(par, seq);
    }
}
