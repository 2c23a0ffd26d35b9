use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use tiledetect::{
    discriminate, Candidate, DedupConfig, DetectConfig, Detector, ImageView, LogBlobExtractor,
    PaddedTileGrid, PassthroughClassifier, TileGeometry,
};

fn make_image(width: usize, height: usize) -> Vec<u8> {
    let mut data = vec![0u8; width * height];
    for cy in (20..height).step_by(45) {
        for cx in (20..width).step_by(45) {
            for y in cy.saturating_sub(8)..(cy + 8).min(height) {
                for x in cx.saturating_sub(8)..(cx + 8).min(width) {
                    let d2 = (x as f32 - cx as f32).powi(2) + (y as f32 - cy as f32).powi(2);
                    let v = 240.0 * (-d2 / 18.0).exp();
                    data[y * width + x] = data[y * width + x].max(v as u8);
                }
            }
        }
    }
    data
}

fn make_candidates(count: usize) -> Vec<Candidate> {
    (0..count)
        .map(|i| Candidate {
            x: 10 + ((i * 37) % 980) as i64,
            y: 10 + ((i * 91) % 980) as i64,
            r: 5.0 + (i % 9) as f32,
            confidence: ((i * 53) % 100) as f32 / 100.0,
        })
        .collect()
}

fn bench_pipeline(c: &mut Criterion) {
    let (width, height) = (256usize, 256usize);
    let image = make_image(width, height);
    let image_view = ImageView::from_slice(&image, width, height).unwrap();

    c.bench_function("tile_extract_all", |b| {
        let grid = PaddedTileGrid::new(height, width, TileGeometry::from_stride(64, 64)).unwrap();
        b.iter(|| {
            for placement in grid.placements() {
                black_box(grid.extract_tile(image_view, placement).unwrap());
            }
        });
    });

    let candidates = make_candidates(4000);
    c.bench_function("discriminate_4000", |b| {
        b.iter(|| black_box(discriminate(&candidates, 1000, 1000, &DedupConfig::default()).unwrap()));
    });

    let cfg = DetectConfig {
        min_sigma: 2.0,
        max_sigma: 5.0,
        num_sigma: 4,
        threshold: 5.0,
        ..DetectConfig::default().with_stride(64, 64)
    };
    let detector =
        Detector::new(PassthroughClassifier, LogBlobExtractor::default()).with_config(cfg.clone());
    c.bench_function("detect_log_256", |b| {
        b.iter(|| black_box(detector.detect(image_view).unwrap()));
    });

    if cfg!(feature = "rayon") {
        let detector_par = Detector::new(PassthroughClassifier, LogBlobExtractor::default())
            .with_config(DetectConfig {
                parallel: true,
                ..cfg
            });
        c.bench_function("detect_log_256_parallel", |b| {
            b.iter(|| black_box(detector_par.detect(image_view).unwrap()));
        });
    }
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);
