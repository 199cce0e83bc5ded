//! Per-crop candidate selection: threshold, decode, suppress, rank.

use crate::anchor::Anchor;
use crate::candidate::nms::nms_boxes;
use crate::candidate::topk::top_k_classes;
use crate::codec::{decode, RegressionDelta, ScaleFactors};
use crate::detection::Detection;
use crate::tensor::CropOutputs;
use crate::trace::trace_debug;
use crate::util::{AnchorBoxError, AnchorBoxResult};

/// Parameters of one [`select`] call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SelectionParams {
    /// Anchors need objectness strictly above this to become candidates.
    pub objectness_threshold: f32,
    /// Suppress boxes whose IoU with a kept box exceeds this.
    pub iou_threshold: f32,
    /// Maximum detections emitted per crop.
    pub max_output: usize,
    /// Classes retained per detection.
    pub top_k: usize,
    /// Decode scale factors.
    pub scale_factors: ScaleFactors,
    /// Clip decoded boxes to `[0, 1]` before suppression.
    pub clip_boxes: bool,
}

/// Selects the detections of a single crop.
///
/// Objectness is `1 - p(background)`. Candidates above the threshold are
/// decoded against their anchors and reduced by greedy NMS; each survivor
/// carries the top-K classes of its full probability vector. The result is in
/// emission order (highest objectness first) and may be empty.
///
/// Fails with a shape error when the outputs do not have one row per anchor,
/// the deltas are not 4 wide, or `top_k` exceeds the probability width.
pub fn select(
    outputs: CropOutputs<'_>,
    anchors: &[Anchor],
    params: &SelectionParams,
) -> AnchorBoxResult<Vec<Detection>> {
    let probs = outputs.class_probs;
    let deltas = outputs.deltas;
    probs.expect_shape(anchors.len(), probs.cols(), "class probabilities")?;
    deltas.expect_shape(anchors.len(), 4, "regression deltas")?;
    if params.top_k > probs.cols() {
        return Err(AnchorBoxError::TopKExceedsClasses {
            top_k: params.top_k,
            width: probs.cols(),
        });
    }

    let mut candidates = Vec::new();
    let mut scores = Vec::new();
    for (idx, row) in probs.iter_rows().enumerate() {
        let objectness = 1.0 - row[0];
        if objectness > params.objectness_threshold {
            candidates.push(idx);
            scores.push(objectness);
        }
    }
    if candidates.is_empty() {
        trace_debug!("crop_no_candidates", anchors = anchors.len());
        return Ok(Vec::new());
    }

    let mut boxes = Vec::with_capacity(candidates.len());
    for &idx in &candidates {
        let row = deltas.row(idx).ok_or(AnchorBoxError::RowCountMismatch {
            expected: anchors.len(),
            got: deltas.rows(),
            context: "regression deltas",
        })?;
        let delta = RegressionDelta::from_row(row)?;
        let bbox = decode(delta, &anchors[idx], params.scale_factors);
        boxes.push(if params.clip_boxes { bbox.clipped() } else { bbox });
    }

    // Candidate positions preserve anchor order, so NMS tie-breaking on
    // position is tie-breaking on anchor index.
    let kept = nms_boxes(&boxes, &scores, params.iou_threshold, params.max_output);

    let mut detections = Vec::with_capacity(kept.len());
    for pos in kept {
        let row = probs.row(candidates[pos]).ok_or(AnchorBoxError::RowCountMismatch {
            expected: anchors.len(),
            got: probs.rows(),
            context: "class probabilities",
        })?;
        let (class_ids, class_scores) = top_k_classes(row, params.top_k)?;
        detections.push(Detection {
            bbox: boxes[pos],
            class_ids,
            class_scores,
        });
    }

    trace_debug!(
        "crop_selected",
        candidates = candidates.len(),
        kept = detections.len()
    );
    Ok(detections)
}
