//! Greedy IoU-based non-maximum suppression.

use crate::bbox::BoundingBox;
use crate::util::math::score_desc_index_asc;

/// Runs greedy NMS and returns the kept input indices in emission order.
///
/// Boxes are visited by descending score (lower index first on ties). Each kept
/// box suppresses every later box whose IoU with it exceeds `iou_threshold`.
/// Stops after `max_output` boxes. Degenerate boxes are kept as zero-area
/// boxes, so they never suppress anything and are never suppressed.
///
/// # Panics
///
/// Panics in debug builds if `boxes` and `scores` differ in length.
pub fn nms_boxes(
    boxes: &[BoundingBox],
    scores: &[f32],
    iou_threshold: f32,
    max_output: usize,
) -> Vec<usize> {
    debug_assert_eq!(boxes.len(), scores.len());
    let n = boxes.len().min(scores.len());
    if n == 0 || max_output == 0 {
        return Vec::new();
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| score_desc_index_asc((scores[a], a), (scores[b], b)));

    let mut suppressed = vec![false; n];
    let mut kept = Vec::with_capacity(max_output.min(n));

    for (pos, &idx) in order.iter().enumerate() {
        if suppressed[idx] {
            continue;
        }
        kept.push(idx);
        if kept.len() == max_output {
            break;
        }
        let seed = &boxes[idx];
        for &other in &order[pos + 1..] {
            if !suppressed[other] && seed.iou(&boxes[other]) > iou_threshold {
                suppressed[other] = true;
            }
        }
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::nms_boxes;
    use crate::bbox::BoundingBox;

    #[test]
    fn overlapping_lower_score_is_dropped() {
        let boxes = [
            BoundingBox::new(0.0, 0.0, 1.0, 1.0),
            BoundingBox::new(0.0, 0.1, 1.0, 1.1),
            BoundingBox::new(2.0, 2.0, 3.0, 3.0),
        ];
        let kept = nms_boxes(&boxes, &[0.6, 0.9, 0.5], 0.5, 10);
        assert_eq!(kept, vec![1, 2]);
    }

    #[test]
    fn iou_below_threshold_is_kept() {
        let boxes = [
            BoundingBox::new(0.0, 0.0, 1.0, 1.0),
            BoundingBox::new(0.0, 0.5, 1.0, 1.5),
        ];
        // IoU is 1/3.
        assert_eq!(nms_boxes(&boxes, &[0.9, 0.8], 0.34, 10), vec![0, 1]);
        assert_eq!(nms_boxes(&boxes, &[0.9, 0.8], 0.3, 10), vec![0]);
    }

    #[test]
    fn max_output_caps_emission() {
        let boxes: Vec<BoundingBox> = (0..5)
            .map(|i| {
                let y = i as f32 * 2.0;
                BoundingBox::new(y, 0.0, y + 1.0, 1.0)
            })
            .collect();
        let scores = [0.1, 0.5, 0.3, 0.9, 0.7];
        assert_eq!(nms_boxes(&boxes, &scores, 0.5, 2), vec![3, 4]);
        assert!(nms_boxes(&boxes, &scores, 0.5, 0).is_empty());
    }

    #[test]
    fn equal_scores_prefer_lower_index() {
        let b = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        assert_eq!(nms_boxes(&[b, b, b], &[0.7, 0.7, 0.7], 0.5, 10), vec![0]);
    }
}
