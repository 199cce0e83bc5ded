//! Batch assembly across crops.
//!
//! Every crop is selected independently against the shared anchor list. A crop
//! without detections receives one sentinel row, so each crop slot always holds
//! at least one row and the outer length always equals the crop count.

use crate::anchor::Anchor;
use crate::candidate::select::{select, SelectionParams};
use crate::detection::Detection;
use crate::tensor::BatchOutputs;
use crate::trace::{trace_event, trace_span};
use crate::util::math::is_unit;
use crate::util::{AnchorBoxError, AnchorBoxResult};

#[cfg(feature = "rayon")]
pub mod rayon;

/// Thresholds of a named operating policy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SelectionPolicy {
    /// Minimum objectness (exclusive).
    pub objectness_threshold: f32,
    /// NMS IoU threshold.
    pub iou_threshold: f32,
    /// Maximum detections per crop.
    pub max_output: usize,
    /// Classes retained per detection; `None` uses the detector-wide value.
    pub top_k: Option<usize>,
}

impl SelectionPolicy {
    /// Interactive visualization: every non-background anchor competes and
    /// only the best class is reported.
    pub const VISUALIZATION: SelectionPolicy = SelectionPolicy {
        objectness_threshold: 0.0,
        iou_threshold: 0.5,
        max_output: 200,
        top_k: Some(1),
    };

    /// Programmatic extraction: fewer, more confident detections.
    pub const PRODUCTION: SelectionPolicy = SelectionPolicy {
        objectness_threshold: 0.4,
        iou_threshold: 0.4,
        max_output: 30,
        top_k: None,
    };

    /// Validates threshold ranges and the output cap.
    pub fn validate(&self) -> AnchorBoxResult<()> {
        if !is_unit(self.objectness_threshold) {
            return Err(AnchorBoxError::InvalidParameter {
                name: "objectness_threshold",
                reason: "must be within [0, 1]",
            });
        }
        if !is_unit(self.iou_threshold) {
            return Err(AnchorBoxError::InvalidParameter {
                name: "iou_threshold",
                reason: "must be within [0, 1]",
            });
        }
        if self.max_output == 0 {
            return Err(AnchorBoxError::InvalidParameter {
                name: "max_output",
                reason: "must be at least 1",
            });
        }
        Ok(())
    }
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self::PRODUCTION
    }
}

/// Selects which configured policy a detection call uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PolicyKind {
    Visualization,
    Production,
}

/// Per-crop detections, in crop input order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DetectionBatch {
    crops: Vec<Vec<Detection>>,
}

/// Pixel-space rows of a whole batch, concatenated in crop order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PixelRows {
    /// `[y1, x1, y2, x2]` per row; sentinel rows stay at `-1`.
    pub boxes: Vec<[f32; 4]>,
    /// Top-K class ids per row.
    pub class_ids: Vec<Vec<u32>>,
    /// Top-K class scores per row.
    pub class_scores: Vec<Vec<f32>>,
    /// Number of rows contributed by each crop.
    pub rows_per_crop: Vec<usize>,
}

impl DetectionBatch {
    /// Wraps already-assembled crop slots.
    pub fn from_crops(crops: Vec<Vec<Detection>>) -> Self {
        Self { crops }
    }

    /// Number of crop slots.
    pub fn len(&self) -> usize {
        self.crops.len()
    }

    /// Returns `true` for a batch of zero crops.
    pub fn is_empty(&self) -> bool {
        self.crops.is_empty()
    }

    /// Detections of crop `idx`.
    pub fn crop(&self, idx: usize) -> Option<&[Detection]> {
        self.crops.get(idx).map(Vec::as_slice)
    }

    /// Iterates over crop slots in input order.
    pub fn iter(&self) -> impl Iterator<Item = &[Detection]> {
        self.crops.iter().map(Vec::as_slice)
    }

    /// Total number of rows, sentinels included.
    pub fn total_rows(&self) -> usize {
        self.crops.iter().map(Vec::len).sum()
    }

    /// Consumes the batch, returning the crop slots.
    pub fn into_crops(self) -> Vec<Vec<Detection>> {
        self.crops
    }

    /// Flattens the batch into pixel-space rows.
    ///
    /// Real boxes are multiplied by `(img_h, img_w, img_h, img_w)`; sentinel
    /// rows are copied through unchanged.
    pub fn to_pixel_rows(&self, img_h: f32, img_w: f32) -> PixelRows {
        let mut out = PixelRows {
            rows_per_crop: Vec::with_capacity(self.crops.len()),
            ..PixelRows::default()
        };
        for crop in &self.crops {
            out.rows_per_crop.push(crop.len());
            for det in crop {
                let bbox = if det.is_sentinel() {
                    det.bbox
                } else {
                    det.bbox.scaled(img_h, img_w)
                };
                out.boxes.push(bbox.to_array());
                out.class_ids.push(det.class_ids.clone());
                out.class_scores.push(det.class_scores.clone());
            }
        }
        out
    }
}

/// Replaces an empty crop result by a single sentinel row.
pub(crate) fn fill_sentinel(mut detections: Vec<Detection>, top_k: usize) -> Vec<Detection> {
    if detections.is_empty() {
        detections.push(Detection::sentinel(top_k));
    }
    detections
}

/// Runs selection for every crop in order and pads empty crops.
///
/// A shape error in any crop aborts the whole batch.
pub fn assemble(
    outputs: &BatchOutputs<'_>,
    anchors: &[Anchor],
    params: &SelectionParams,
) -> AnchorBoxResult<DetectionBatch> {
    let _span = trace_span!("assemble", crops = outputs.num_crops(), parallel = false).entered();

    let mut crops = Vec::with_capacity(outputs.num_crops());
    for crop in outputs.crops() {
        let detections = select(crop, anchors, params)?;
        crops.push(fill_sentinel(detections, params.top_k));
    }

    let batch = DetectionBatch { crops };
    trace_event!("batch_assembled", crops = batch.len(), rows = batch.total_rows());
    Ok(batch)
}
