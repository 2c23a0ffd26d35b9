//! The shipped CLI example config must stay in sync with the library defaults.

use serde::Deserialize;
use tiledetect::{DetectConfig, SelfMatchPolicy};

const EXAMPLE_JSON: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/tiledetect-cli/config.example.json"
));

#[derive(Debug, Deserialize)]
struct ExampleDetect {
    stride: [usize; 2],
    min_r: f32,
    max_r: f32,
    min_sigma: f32,
    max_sigma: f32,
    num_sigma: usize,
    threshold: f32,
    border: i64,
    overlap_tolerance: f32,
    pred_tolerance: f32,
    detect_samples: usize,
    self_match: String,
    max_attempts: u32,
}

#[derive(Debug, Deserialize)]
struct Example {
    image_path: String,
    output_format: String,
    detect: ExampleDetect,
}

#[test]
fn example_config_matches_library_defaults() {
    let example: Example = serde_json::from_str(EXAMPLE_JSON).unwrap();
    assert!(!example.image_path.is_empty());
    assert!(matches!(example.output_format.as_str(), "json" | "csv"));

    let d = example.detect;
    let cfg = DetectConfig::default();
    assert_eq!(d.stride, [cfg.stride_rows, cfg.stride_cols]);
    assert_eq!(cfg.window_rows, 2 * cfg.stride_rows);
    assert_eq!(cfg.window_cols, 2 * cfg.stride_cols);
    assert_eq!(d.min_r, cfg.min_r);
    assert_eq!(d.max_r, cfg.max_r);
    assert_eq!(d.min_sigma, cfg.min_sigma);
    assert_eq!(d.max_sigma, cfg.max_sigma);
    assert_eq!(d.num_sigma, cfg.num_sigma);
    assert_eq!(d.threshold, cfg.threshold);
    assert_eq!(d.border, cfg.border);
    assert_eq!(d.overlap_tolerance, cfg.overlap_tolerance);
    assert_eq!(d.pred_tolerance, cfg.pred_tolerance);
    assert_eq!(d.detect_samples, cfg.detect_samples);
    assert_eq!(d.self_match, "count_once");
    assert_eq!(cfg.self_match, SelfMatchPolicy::CountOnce);
    assert_eq!(d.max_attempts, cfg.retry.max_attempts);
}

#[test]
fn example_config_is_valid() {
    let example: Example = serde_json::from_str(EXAMPLE_JSON).unwrap();
    let d = example.detect;
    let cfg = DetectConfig {
        min_r: d.min_r,
        max_r: d.max_r,
        pred_tolerance: d.pred_tolerance,
        detect_samples: d.detect_samples,
        ..DetectConfig::default().with_stride(d.stride[0], d.stride[1])
    };
    assert!(cfg.validate().is_ok());
}

#[test]
fn schema_is_well_formed_json() {
    let schema: serde_json::Value = serde_json::from_str(include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/tiledetect-cli/config.schema.json"
    )))
    .unwrap();
    let detect = &schema["properties"]["detect"]["properties"];
    assert_eq!(detect["detect_samples"]["default"], 4);
    assert_eq!(detect["stride"]["default"][0], 256);
}
