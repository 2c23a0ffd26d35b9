use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, BufWriter};
use std::path::PathBuf;
use tiledetect::io::load_gray_image;
use tiledetect::{
    Candidate, DetectConfig, DetectionResult, Detector, LogBlobExtractor, PassthroughClassifier,
    RetryPolicy, SelfMatchPolicy,
};
use tracing_subscriber::EnvFilter;

const SCHEMA_JSON: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.schema.json"));
const EXAMPLE_JSON: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.example.json"));

#[derive(Parser, Debug)]
#[command(author, version, about = "Tiled defect detection (JSON config driven)")]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "config.json")]
    config: PathBuf,
    /// Print the JSON schema and exit.
    #[arg(long)]
    print_schema: bool,
    /// Print an example config and exit.
    #[arg(long)]
    print_example: bool,
    /// Enable tracing output.
    #[arg(long)]
    trace: bool,
    /// Print progress percentages to stderr.
    #[arg(long)]
    progress: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
enum OutputFormat {
    #[default]
    Json,
    Csv,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum SelfMatchConfig {
    CountOnce,
    CountTwice,
}

impl From<SelfMatchConfig> for SelfMatchPolicy {
    fn from(value: SelfMatchConfig) -> Self {
        match value {
            SelfMatchConfig::CountOnce => SelfMatchPolicy::CountOnce,
            SelfMatchConfig::CountTwice => SelfMatchPolicy::CountTwice,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct DetectConfigJson {
    stride: [usize; 2],
    window: Option<[usize; 2]>,
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
    self_match: SelfMatchConfig,
    parallel: bool,
    max_attempts: u32,
}

impl Default for DetectConfigJson {
    fn default() -> Self {
        let cfg = DetectConfig::default();
        Self {
            stride: [cfg.stride_rows, cfg.stride_cols],
            window: None,
            min_r: cfg.min_r,
            max_r: cfg.max_r,
            min_sigma: cfg.min_sigma,
            max_sigma: cfg.max_sigma,
            num_sigma: cfg.num_sigma,
            threshold: cfg.threshold,
            border: cfg.border,
            overlap_tolerance: cfg.overlap_tolerance,
            pred_tolerance: cfg.pred_tolerance,
            detect_samples: cfg.detect_samples,
            self_match: SelfMatchConfig::CountOnce,
            parallel: true,
            max_attempts: cfg.retry.max_attempts,
        }
    }
}

impl From<DetectConfigJson> for DetectConfig {
    fn from(value: DetectConfigJson) -> Self {
        let mut cfg = DetectConfig::default().with_stride(value.stride[0], value.stride[1]);
        if let Some([rows, cols]) = value.window {
            cfg.window_rows = rows;
            cfg.window_cols = cols;
        }
        DetectConfig {
            min_r: value.min_r,
            max_r: value.max_r,
            min_sigma: value.min_sigma,
            max_sigma: value.max_sigma,
            num_sigma: value.num_sigma,
            threshold: value.threshold,
            border: value.border,
            overlap_tolerance: value.overlap_tolerance,
            pred_tolerance: value.pred_tolerance,
            detect_samples: value.detect_samples,
            self_match: value.self_match.into(),
            parallel: value.parallel,
            retry: RetryPolicy {
                max_attempts: value.max_attempts,
            },
            ..cfg
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct Config {
    image_path: String,
    output_path: Option<String>,
    output_format: OutputFormat,
    detect: DetectConfigJson,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            image_path: String::new(),
            output_path: None,
            output_format: OutputFormat::Json,
            detect: DetectConfigJson::default(),
        }
    }
}

#[derive(Debug, Serialize)]
struct CandidateRecord {
    x: i64,
    y: i64,
    r: f32,
    confidence: f32,
}

impl From<Candidate> for CandidateRecord {
    fn from(value: Candidate) -> Self {
        Self {
            x: value.x,
            y: value.y,
            r: value.r,
            confidence: value.confidence,
        }
    }
}

#[derive(Debug, Serialize)]
struct Output {
    image_path: String,
    /// `None` when no candidate was accepted.
    aggregate_confidence: Option<f32>,
    raw_count: usize,
    pruned_count: usize,
    candidates: Vec<CandidateRecord>,
}

impl Output {
    fn new(image_path: String, result: DetectionResult) -> Self {
        Self {
            image_path,
            aggregate_confidence: result.aggregate(),
            raw_count: result.raw_count,
            pruned_count: result.pruned_count,
            candidates: result.candidates.into_iter().map(CandidateRecord::from).collect(),
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.trace {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive("tiledetect=info".parse()?),
            )
            .with_target(false)
            .with_writer(io::stderr)
            .init();
    }

    if cli.print_schema {
        println!("{SCHEMA_JSON}");
        return Ok(());
    }
    if cli.print_example {
        println!("{EXAMPLE_JSON}");
        return Ok(());
    }

    let config_text = fs::read_to_string(&cli.config)?;
    let config: Config = serde_json::from_str(&config_text)?;
    if config.image_path.is_empty() {
        return Err("image_path must be set in the config".into());
    }

    let image = load_gray_image(&config.image_path)?;
    let mut detector = Detector::new(PassthroughClassifier, LogBlobExtractor::default())
        .with_config(config.detect.into());
    if cli.progress {
        detector = detector.with_progress(|p: u8| eprintln!("progress: {p}%"));
    }

    let result = detector.detect(image.view())?;

    match config.output_format {
        OutputFormat::Csv => match config.output_path {
            Some(path) => result.write_csv(BufWriter::new(fs::File::create(path)?))?,
            None => result.write_csv(io::stdout().lock())?,
        },
        OutputFormat::Json => {
            let output = Output::new(config.image_path, result);
            let json = serde_json::to_string_pretty(&output)?;
            match config.output_path {
                Some(path) => fs::write(path, json)?,
                None => println!("{json}"),
            }
        }
    }

    Ok(())
}
