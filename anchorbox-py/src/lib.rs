//! Python bindings for the anchorbox detection post-processor.
//!
//! Exposes a `Detector` that consumes numpy model outputs and returns either
//! detection objects or the fixed-width numpy arrays of the production API.

use numpy::{PyArray2, PyReadonlyArray3, PyUntypedArrayMethods};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;

use anchorbox::{
    AnchorBoxError, AnchorConfig, BatchOutputs, Detection as RustDetection,
    Detector as RustDetector, DetectorConfig, PolicyKind, ScaleFactors,
};

/// Convert an AnchorBoxError to a Python exception.
fn to_py_err(err: AnchorBoxError) -> PyErr {
    if err.is_config() {
        PyValueError::new_err(err.to_string())
    } else {
        PyRuntimeError::new_err(err.to_string())
    }
}

fn parse_policy(policy: &str) -> PyResult<PolicyKind> {
    match policy.to_lowercase().as_str() {
        "production" => Ok(PolicyKind::Production),
        "visualization" => Ok(PolicyKind::Visualization),
        _ => Err(PyValueError::new_err(
            "policy must be 'production' or 'visualization'",
        )),
    }
}

/// A single detection with normalized box coordinates.
#[pyclass]
#[derive(Clone)]
pub struct Detection {
    /// Box as (y1, x1, y2, x2), normalized to the network input.
    #[pyo3(get)]
    pub bbox: (f32, f32, f32, f32),
    /// Top-K class ids, best first.
    #[pyo3(get)]
    pub class_ids: Vec<u32>,
    /// Top-K class probabilities, descending.
    #[pyo3(get)]
    pub class_scores: Vec<f32>,
    /// True for the placeholder row of a crop without detections.
    #[pyo3(get)]
    pub sentinel: bool,
}

#[pymethods]
impl Detection {
    fn __repr__(&self) -> String {
        let (y1, x1, y2, x2) = self.bbox;
        format!(
            "Detection(bbox=({y1:.3}, {x1:.3}, {y2:.3}, {x2:.3}), class_ids={:?}, sentinel={})",
            self.class_ids,
            if self.sentinel { "True" } else { "False" }
        )
    }
}

impl From<&RustDetection> for Detection {
    fn from(det: &RustDetection) -> Self {
        let b = det.bbox;
        Self {
            bbox: (b.y1, b.x1, b.y2, b.x2),
            class_ids: det.class_ids.clone(),
            class_scores: det.class_scores.clone(),
            sentinel: det.is_sentinel(),
        }
    }
}

/// Anchor-based detection post-processor.
#[pyclass]
pub struct Detector {
    inner: RustDetector,
}

impl Detector {
    fn batch_outputs<'a>(
        &self,
        class_probs: &'a PyReadonlyArray3<'_, f32>,
        deltas: &'a PyReadonlyArray3<'_, f32>,
    ) -> PyResult<BatchOutputs<'a>> {
        let shape = class_probs.shape();
        let (num_crops, num_anchors, width) = (shape[0], shape[1], shape[2]);
        if width < 2 {
            return Err(PyValueError::new_err(
                "class_probs needs a background column and at least one class",
            ));
        }
        let probs = class_probs.as_slice()?;
        let deltas = deltas.as_slice()?;
        BatchOutputs::new(probs, deltas, num_crops, num_anchors, width - 1).map_err(to_py_err)
    }
}

#[pymethods]
impl Detector {
    /// Create a detector and generate its anchors.
    ///
    /// Args:
    ///     input_shape: Network input (height, width) in pixels
    ///     base_anchor_sizes: Base anchor size per level, in pixels
    ///     anchor_strides: Stride per level, in pixels
    ///     anchor_scales: Multiplicative size factors (default: [1.0])
    ///     anchor_ratios: Width / height ratios (default: [1.0])
    ///     scale_factors: Decode divisors (sy, sx, sh, sw) (default: (10, 10, 5, 5))
    ///     top_k: Classes kept per production detection (default: 1)
    ///     num_classes: Expected foreground class count (default: None)
    ///     clip_boxes: Clip boxes to [0, 1] before suppression (default: False)
    ///     parallel: Process crops in parallel (default: False)
    #[new]
    #[pyo3(signature = (
        input_shape,
        base_anchor_sizes,
        anchor_strides,
        anchor_scales = vec![1.0],
        anchor_ratios = vec![1.0],
        scale_factors = (10.0, 10.0, 5.0, 5.0),
        top_k = 1,
        num_classes = None,
        clip_boxes = false,
        parallel = false
    ))]
    #[allow(clippy::too_many_arguments)]
    fn new(
        input_shape: (usize, usize),
        base_anchor_sizes: Vec<f32>,
        anchor_strides: Vec<usize>,
        anchor_scales: Vec<f32>,
        anchor_ratios: Vec<f32>,
        scale_factors: (f32, f32, f32, f32),
        top_k: usize,
        num_classes: Option<usize>,
        clip_boxes: bool,
        parallel: bool,
    ) -> PyResult<Self> {
        let anchor_cfg = AnchorConfig::from_level_lists(
            input_shape.0,
            input_shape.1,
            &base_anchor_sizes,
            &anchor_strides,
            anchor_scales,
            anchor_ratios,
        )
        .map_err(to_py_err)?;
        let (sy, sx, sh, sw) = scale_factors;
        let cfg = DetectorConfig {
            scale_factors: ScaleFactors::from_array([sy, sx, sh, sw]),
            top_k,
            num_classes,
            clip_boxes,
            parallel,
            ..DetectorConfig::default()
        };
        let inner = RustDetector::new(&anchor_cfg)
            .and_then(|detector| detector.with_config(cfg))
            .map_err(to_py_err)?;
        Ok(Self { inner })
    }

    /// Number of generated anchors.
    #[getter]
    fn num_anchors(&self) -> usize {
        self.inner.anchors().len()
    }

    /// Anchors as an (N, 4) array of (center_y, center_x, height, width).
    fn anchors<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyArray2<f32>>> {
        let rows: Vec<Vec<f32>> = self
            .inner
            .anchors()
            .as_slice()
            .iter()
            .map(|a| vec![a.center_y, a.center_x, a.height, a.width])
            .collect();
        PyArray2::from_vec2(py, &rows).map_err(|err| PyValueError::new_err(err.to_string()))
    }

    /// Post-process a batch into per-crop detection lists.
    ///
    /// Args:
    ///     class_probs: float32 array (crops, anchors, 1 + num_classes)
    ///     deltas: float32 array (crops, anchors, 4)
    ///     policy: "production" or "visualization" (default: "production")
    ///
    /// Returns:
    ///     One list per crop; empty crops hold a single sentinel detection
    #[pyo3(signature = (class_probs, deltas, policy = "production"))]
    fn detect(
        &self,
        class_probs: PyReadonlyArray3<'_, f32>,
        deltas: PyReadonlyArray3<'_, f32>,
        policy: &str,
    ) -> PyResult<Vec<Vec<Detection>>> {
        let kind = parse_policy(policy)?;
        let outputs = self.batch_outputs(&class_probs, &deltas)?;
        let batch = self.inner.detect(&outputs, kind).map_err(to_py_err)?;
        Ok(batch
            .iter()
            .map(|crop| crop.iter().map(Detection::from).collect())
            .collect())
    }

    /// Production detections as fixed-width numpy arrays.
    ///
    /// Rows of all crops are concatenated in crop order. Boxes are scaled to
    /// network input pixels; sentinel rows keep -1 boxes and scores.
    ///
    /// Returns:
    ///     (boxes (R, 4), class_ids (R, K), class_scores (R, K), rows_per_crop)
    #[allow(clippy::type_complexity)]
    fn extract<'py>(
        &self,
        py: Python<'py>,
        class_probs: PyReadonlyArray3<'_, f32>,
        deltas: PyReadonlyArray3<'_, f32>,
    ) -> PyResult<(
        Bound<'py, PyArray2<f32>>,
        Bound<'py, PyArray2<u32>>,
        Bound<'py, PyArray2<f32>>,
        Vec<usize>,
    )> {
        let outputs = self.batch_outputs(&class_probs, &deltas)?;
        let rows = self.inner.extract_pixels(&outputs).map_err(to_py_err)?;
        let to_err = |err: numpy::FromVecError| PyValueError::new_err(err.to_string());

        let boxes: Vec<Vec<f32>> = rows.boxes.iter().map(|b| b.to_vec()).collect();
        let boxes = PyArray2::from_vec2(py, &boxes).map_err(to_err)?;
        let class_ids = PyArray2::from_vec2(py, &rows.class_ids).map_err(to_err)?;
        let class_scores = PyArray2::from_vec2(py, &rows.class_scores).map_err(to_err)?;
        Ok((boxes, class_ids, class_scores, rows.rows_per_crop))
    }

    fn __repr__(&self) -> String {
        let (h, w) = self.inner.input_size();
        format!(
            "Detector(input_shape=({h}, {w}), num_anchors={}, top_k={})",
            self.inner.anchors().len(),
            self.inner.config().top_k
        )
    }
}

/// Python module for anchorbox detection post-processing.
#[pymodule]
fn _anchorbox(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<Detection>()?;
    m.add_class::<Detector>()?;
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    Ok(())
}
