//! Python bindings for the tiledetect defect detection library.
//!
//! Images come in as 2D `uint8` numpy arrays. A classifier may be any Python
//! callable that maps a `uint8` tile to a `float32` response of the same shape.

use numpy::{PyArray1, PyArrayMethods, PyReadonlyArray2, PyUntypedArrayMethods};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;

use tiledetect::{
    Candidate as RustCandidate, ClassifierError, DedupConfig, DetectConfig as RustDetectConfig,
    DetectionResult as RustDetectionResult, Detector, ImageView, LogBlobExtractor, OwnedImage,
    PassthroughClassifier, ResponseMap, RetryPolicy, SelfMatchPolicy, TileClassifier,
    TileDetectError,
};

fn to_py_err(err: TileDetectError) -> PyErr {
    match err {
        TileDetectError::InvalidConfig { .. }
        | TileDetectError::InvalidDimensions { .. }
        | TileDetectError::InvalidStride { .. }
        | TileDetectError::BufferTooSmall { .. } => PyValueError::new_err(err.to_string()),
        _ => PyRuntimeError::new_err(err.to_string()),
    }
}

fn parse_self_match(value: &str) -> PyResult<SelfMatchPolicy> {
    match value.to_lowercase().as_str() {
        "count_once" => Ok(SelfMatchPolicy::CountOnce),
        "count_twice" => Ok(SelfMatchPolicy::CountTwice),
        _ => Err(PyValueError::new_err(
            "self_match must be 'count_once' or 'count_twice'",
        )),
    }
}

fn image_view<'a>(image: &'a PyReadonlyArray2<'_, u8>) -> PyResult<ImageView<'a, u8>> {
    let shape = image.shape();
    let height = shape[0];
    let width = shape[1];
    let data = image.as_slice()?;
    ImageView::from_slice(data, width, height).map_err(to_py_err)
}

/// A detected defect center in image coordinates.
#[pyclass]
#[derive(Clone)]
pub struct Candidate {
    /// Column in the original image.
    #[pyo3(get)]
    pub x: i64,
    /// Row in the original image.
    #[pyo3(get)]
    pub y: i64,
    /// Radius in pixels.
    #[pyo3(get)]
    pub r: f32,
    /// Confidence in [0, 1].
    #[pyo3(get)]
    pub confidence: f32,
}

#[pymethods]
impl Candidate {
    #[new]
    fn new(x: i64, y: i64, r: f32, confidence: f32) -> Self {
        Self {
            x,
            y,
            r,
            confidence,
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "Candidate(x={}, y={}, r={:.2}, confidence={:.4})",
            self.x, self.y, self.r, self.confidence
        )
    }
}

impl From<RustCandidate> for Candidate {
    fn from(c: RustCandidate) -> Self {
        Self {
            x: c.x,
            y: c.y,
            r: c.r,
            confidence: c.confidence,
        }
    }
}

impl From<&Candidate> for RustCandidate {
    fn from(c: &Candidate) -> Self {
        Self {
            x: c.x,
            y: c.y,
            r: c.r,
            confidence: c.confidence,
        }
    }
}

/// Deduplicated detections plus the aggregate confidence.
#[pyclass]
pub struct DetectionResult {
    inner: RustDetectionResult,
}

#[pymethods]
impl DetectionResult {
    /// Accepted candidates, in acceptance order.
    #[getter]
    fn candidates(&self) -> Vec<Candidate> {
        self.inner
            .candidates
            .iter()
            .copied()
            .map(Candidate::from)
            .collect()
    }

    /// Mean confidence of the accepted candidates, or None when nothing was accepted.
    #[getter]
    fn aggregate_confidence(&self) -> Option<f32> {
        self.inner.aggregate()
    }

    #[getter]
    fn raw_count(&self) -> usize {
        self.inner.raw_count
    }

    #[getter]
    fn pruned_count(&self) -> usize {
        self.inner.pruned_count
    }

    /// Write the candidates as CSV (`x,y,r,confidence`).
    fn to_csv(&self, path: &str) -> PyResult<()> {
        let file = std::fs::File::create(path)?;
        self.inner
            .write_csv(std::io::BufWriter::new(file))
            .map_err(to_py_err)
    }

    fn __len__(&self) -> usize {
        self.inner.len()
    }

    fn __repr__(&self) -> String {
        format!(
            "DetectionResult(candidates={}, aggregate_confidence={:.4})",
            self.inner.len(),
            self.inner.aggregate_confidence
        )
    }
}

/// Configuration of a detection run.
#[pyclass]
#[derive(Clone)]
pub struct DetectConfig {
    inner: RustDetectConfig,
}

#[pymethods]
impl DetectConfig {
    /// Create a new DetectConfig.
    ///
    /// Args:
    ///     stride: Tile step (rows, cols) (default: (256, 256))
    ///     window: Tile size (rows, cols) (default: 2 * stride)
    ///     min_r: Minimum blob radius (default: 5.0)
    ///     max_r: Maximum blob radius (default: 14.0)
    ///     min_sigma: Smallest LoG sigma (default: 3.0)
    ///     max_sigma: Largest LoG sigma (default: 15.0)
    ///     num_sigma: Number of sigma samples (default: 15)
    ///     threshold: LoG response threshold (default: 0.1)
    ///     border: Border margin for pruning (default: 3)
    ///     overlap_tolerance: Merge overlap in pixels (default: 2.0)
    ///     pred_tolerance: Minimum averaged confidence (default: 0.33)
    ///     detect_samples: Expected observations per defect (default: 4)
    ///     self_match: "count_once" or "count_twice" (default: "count_once")
    ///     parallel: Process tiles in parallel (default: False)
    ///     max_attempts: Classifier attempts per tile (default: 1)
    #[new]
    #[pyo3(signature = (
        stride = (256, 256),
        window = None,
        min_r = 5.0,
        max_r = 14.0,
        min_sigma = 3.0,
        max_sigma = 15.0,
        num_sigma = 15,
        threshold = 0.1,
        border = 3,
        overlap_tolerance = 2.0,
        pred_tolerance = 0.33,
        detect_samples = 4,
        self_match = "count_once",
        parallel = false,
        max_attempts = 1
    ))]
    #[allow(clippy::too_many_arguments)]
    fn new(
        stride: (usize, usize),
        window: Option<(usize, usize)>,
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
        self_match: &str,
        parallel: bool,
        max_attempts: u32,
    ) -> PyResult<Self> {
        let mut inner = RustDetectConfig::default().with_stride(stride.0, stride.1);
        if let Some((rows, cols)) = window {
            inner.window_rows = rows;
            inner.window_cols = cols;
        }
        let inner = RustDetectConfig {
            min_r,
            max_r,
            min_sigma,
            max_sigma,
            num_sigma,
            threshold,
            border,
            overlap_tolerance,
            pred_tolerance,
            detect_samples,
            self_match: parse_self_match(self_match)?,
            parallel,
            retry: RetryPolicy { max_attempts },
            ..inner
        };
        inner.validate().map_err(to_py_err)?;
        Ok(Self { inner })
    }

    /// Validate the configuration.
    fn validate(&self) -> PyResult<()> {
        self.inner.validate().map_err(to_py_err)
    }

    fn __repr__(&self) -> String {
        format!(
            "DetectConfig(stride=({}, {}), window=({}, {}), pred_tolerance={}, detect_samples={}, parallel={})",
            self.inner.stride_rows,
            self.inner.stride_cols,
            self.inner.window_rows,
            self.inner.window_cols,
            self.inner.pred_tolerance,
            self.inner.detect_samples,
            self.inner.parallel
        )
    }
}

/// Adapts a Python callable `tile -> response` to the classifier trait.
struct PyClassifier {
    callable: Py<PyAny>,
}

impl TileClassifier for PyClassifier {
    fn classify(&self, tile: ImageView<'_, u8>) -> Result<ResponseMap, ClassifierError> {
        let width = tile.width();
        let height = tile.height();
        let pixels = OwnedImage::from_view(tile)?.into_vec();
        Python::attach(|py| {
            let array = PyArray1::from_vec(py, pixels).reshape([height, width])?;
            let out = self.callable.bind(py).call1((array,))?;
            let response: PyReadonlyArray2<'_, f32> = out.extract().map_err(PyErr::from)?;
            let shape = response.shape();
            let data: Vec<f32> = response.as_array().iter().copied().collect();
            Ok(OwnedImage::new(data, shape[1], shape[0])?)
        })
    }
}

/// Run the tiled detection pipeline over an image.
///
/// Args:
///     image: 2D uint8 numpy array (height x width)
///     config: DetectConfig (default: DetectConfig())
///     classifier: Optional callable mapping a uint8 tile to a float32
///         response of the same shape. Defaults to using the pixel values
///         unscaled (0..255) as the response.
///         A Python classifier always runs sequentially.
///
/// Returns:
///     DetectionResult
#[pyfunction]
#[pyo3(signature = (image, config = None, classifier = None))]
fn detect(
    image: PyReadonlyArray2<'_, u8>,
    config: Option<DetectConfig>,
    classifier: Option<Py<PyAny>>,
) -> PyResult<DetectionResult> {
    let cfg = config.map(|c| c.inner).unwrap_or_default();
    let view = image_view(&image)?;
    let inner = match classifier {
        Some(callable) => {
            let cfg = RustDetectConfig {
                parallel: false,
                ..cfg
            };
            Detector::new(PyClassifier { callable }, LogBlobExtractor::default())
                .with_config(cfg)
                .detect(view)
        }
        None => Detector::new(PassthroughClassifier, LogBlobExtractor::default())
            .with_config(cfg)
            .detect(view),
    }
    .map_err(to_py_err)?;
    Ok(DetectionResult { inner })
}

/// Deduplicate an existing candidate list for an image of `width x height`.
///
/// Use `detect_samples=1` to re-filter a list that was already merged.
#[pyfunction]
#[pyo3(signature = (
    candidates,
    width,
    height,
    border = 3,
    overlap_tolerance = 2.0,
    pred_tolerance = 0.33,
    detect_samples = 1,
    self_match = "count_once"
))]
#[allow(clippy::too_many_arguments)]
fn discriminate(
    candidates: Vec<Candidate>,
    width: usize,
    height: usize,
    border: i64,
    overlap_tolerance: f32,
    pred_tolerance: f32,
    detect_samples: usize,
    self_match: &str,
) -> PyResult<DetectionResult> {
    let cfg = DedupConfig {
        border,
        overlap_tolerance,
        pred_tolerance,
        detect_samples,
        self_match: parse_self_match(self_match)?,
    };
    let raw: Vec<RustCandidate> = candidates.iter().map(RustCandidate::from).collect();
    let inner = tiledetect::discriminate(&raw, width, height, &cfg).map_err(to_py_err)?;
    Ok(DetectionResult { inner })
}

/// Load an image file as a 2D uint8 array.
#[pyfunction]
fn load_image<'py>(py: Python<'py>, path: &str) -> PyResult<Bound<'py, numpy::PyArray2<u8>>> {
    let owned = tiledetect::io::load_gray_image(path).map_err(to_py_err)?;
    let (width, height) = (owned.width(), owned.height());
    Ok(PyArray1::from_vec(py, owned.into_vec()).reshape([height, width])?)
}

/// Python module for tiled defect detection.
#[pymodule]
fn _tiledetect(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<Candidate>()?;
    m.add_class::<DetectConfig>()?;
    m.add_class::<DetectionResult>()?;
    m.add_function(wrap_pyfunction!(detect, m)?)?;
    m.add_function(wrap_pyfunction!(discriminate, m)?)?;
    m.add_function(wrap_pyfunction!(load_image, m)?)?;

    m.add("__version__", env!("CARGO_PKG_VERSION"))?;

    Ok(())
}
