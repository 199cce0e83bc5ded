use anchorbox::lowlevel::{nms_boxes, select};
use anchorbox::{
    Anchor, AnchorBoxError, BoundingBox, CropOutputs, OutputView, ScaleFactors, SelectionParams,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn anchor(center_y: f32, center_x: f32, size: f32) -> Anchor {
    Anchor {
        center_y,
        center_x,
        height: size,
        width: size,
    }
}

fn production(top_k: usize) -> SelectionParams {
    SelectionParams {
        objectness_threshold: 0.4,
        iou_threshold: 0.4,
        max_output: 30,
        top_k,
        scale_factors: ScaleFactors::default(),
        clip_boxes: false,
    }
}

/// Builds probability rows `[1 - objectness, class scores...]`.
fn prob_rows(objectness: &[f32], class_scores: &[&[f32]]) -> Vec<f32> {
    let mut out = Vec::new();
    for (obj, classes) in objectness.iter().zip(class_scores) {
        out.push(1.0 - obj);
        out.extend_from_slice(classes);
    }
    out
}

fn run(
    probs: &[f32],
    deltas: &[f32],
    anchors: &[Anchor],
    params: &SelectionParams,
) -> Result<Vec<anchorbox::Detection>, AnchorBoxError> {
    let width = probs.len() / anchors.len();
    let outputs = CropOutputs {
        class_probs: OutputView::from_slice(probs, anchors.len(), width)?,
        deltas: OutputView::from_slice(deltas, deltas.len() / 4, 4)?,
    };
    select(outputs, anchors, params)
}

#[test]
fn non_overlapping_candidates_above_threshold_survive() {
    let anchors = [
        anchor(0.2, 0.2, 0.1),
        anchor(0.5, 0.5, 0.1),
        anchor(0.8, 0.8, 0.1),
    ];
    let probs = prob_rows(
        &[0.9, 0.95, 0.1],
        &[&[0.7, 0.2], &[0.15, 0.8], &[0.05, 0.05]],
    );
    let deltas = vec![0.0f32; 12];
    let dets = run(&probs, &deltas, &anchors, &production(1)).unwrap();

    assert_eq!(dets.len(), 2);
    assert_eq!(dets[0].bbox, anchors[1].to_box());
    assert_eq!(dets[1].bbox, anchors[0].to_box());
    assert_eq!(dets[0].class_ids, vec![2]);
    assert_eq!(dets[1].class_ids, vec![1]);
}

#[test]
fn mutually_overlapping_candidates_collapse_to_best() {
    let anchors = [
        anchor(0.50, 0.50, 0.3),
        anchor(0.51, 0.50, 0.3),
        anchor(0.50, 0.51, 0.3),
    ];
    let probs = prob_rows(&[0.9, 0.95, 0.1], &[&[0.9], &[0.95], &[0.1]]);
    let deltas = vec![0.0f32; 12];
    let mut params = production(1);
    params.objectness_threshold = 0.0;
    let dets = run(&probs, &deltas, &anchors, &params).unwrap();

    assert_eq!(dets.len(), 1);
    assert_eq!(dets[0].bbox, anchors[1].to_box());
}

#[test]
fn nothing_above_threshold_is_empty_not_error() {
    let anchors = [anchor(0.2, 0.2, 0.1), anchor(0.6, 0.6, 0.1)];
    let probs = prob_rows(&[0.4, 0.1], &[&[0.4], &[0.1]]);
    let dets = run(&probs, &[0.0; 8], &anchors, &production(1)).unwrap();
    assert!(dets.is_empty());
}

#[test]
fn top_k_classes_are_descending_and_include_background() {
    let anchors = [anchor(0.5, 0.5, 0.2)];
    // Background 0.35 outranks class 3 (0.1).
    let probs = vec![0.35, 0.05, 0.5, 0.1];
    let dets = run(&probs, &[0.0; 4], &anchors, &production(3)).unwrap();
    assert_eq!(dets.len(), 1);
    assert_eq!(dets[0].class_ids, vec![2, 0, 3]);
    assert_eq!(dets[0].class_scores, vec![0.5, 0.35, 0.1]);
}

#[test]
fn equal_objectness_prefers_lower_anchor_index() {
    let anchors = [anchor(0.5, 0.5, 0.2), anchor(0.5, 0.5, 0.2)];
    let probs = prob_rows(&[0.8, 0.8], &[&[0.3], &[0.6]]);
    let dets = run(&probs, &[0.0; 8], &anchors, &production(1)).unwrap();
    assert_eq!(dets.len(), 1);
    assert_eq!(dets[0].class_scores, vec![0.3]);
}

#[test]
fn zero_area_boxes_are_kept() {
    let anchors = [anchor(0.5, 0.5, 0.2), anchor(0.5, 0.5, 0.2)];
    let probs = prob_rows(&[0.9, 0.8], &[&[0.9], &[0.8]]);
    // Second box collapses to a point on top of the first.
    let deltas = [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, -1000.0, -1000.0];
    let dets = run(&probs, &deltas, &anchors, &production(1)).unwrap();
    assert_eq!(dets.len(), 2);
    assert_eq!(dets[1].bbox.area(), 0.0);
}

#[test]
fn max_output_caps_detections() {
    let anchors: Vec<Anchor> = (0..10)
        .map(|i| anchor(0.05 + 0.1 * i as f32, 0.5, 0.05))
        .collect();
    let objectness: Vec<f32> = (0..10).map(|i| 0.5 + 0.04 * i as f32).collect();
    let classes: Vec<[f32; 1]> = objectness.iter().map(|&o| [o]).collect();
    let class_refs: Vec<&[f32]> = classes.iter().map(|c| c.as_slice()).collect();
    let probs = prob_rows(&objectness, &class_refs);
    let mut params = production(1);
    params.max_output = 3;
    let dets = run(&probs, &vec![0.0; 40], &anchors, &params).unwrap();
    assert_eq!(dets.len(), 3);
    assert_eq!(dets[0].bbox, anchors[9].to_box());
    assert_eq!(dets[2].bbox, anchors[7].to_box());
}

#[test]
fn clipping_changes_suppression_of_out_of_frame_boxes() {
    let anchors = [
        Anchor {
            center_y: 0.0,
            center_x: 0.25,
            height: 1.0,
            width: 0.5,
        },
        Anchor {
            center_y: 0.25,
            center_x: 0.25,
            height: 0.5,
            width: 0.5,
        },
    ];
    let probs = prob_rows(&[0.9, 0.8], &[&[0.9], &[0.8]]);
    let mut params = production(1);
    params.iou_threshold = 0.6;

    let unclipped = run(&probs, &[0.0; 8], &anchors, &params).unwrap();
    assert_eq!(unclipped.len(), 2);
    assert!(unclipped[0].bbox.y1 < 0.0);

    params.clip_boxes = true;
    let clipped = run(&probs, &[0.0; 8], &anchors, &params).unwrap();
    assert_eq!(clipped.len(), 1);
    assert_eq!(clipped[0].bbox.y1, 0.0);
}

#[test]
fn misaligned_outputs_are_shape_errors() {
    let anchors = [anchor(0.2, 0.2, 0.1), anchor(0.6, 0.6, 0.1)];
    let probs = prob_rows(&[0.9, 0.9], &[&[0.9], &[0.9]]);
    let err = run(&probs, &[0.0; 4], &anchors, &production(1)).unwrap_err();
    assert_eq!(
        err,
        AnchorBoxError::RowCountMismatch {
            expected: 2,
            got: 1,
            context: "regression deltas",
        }
    );

    let err = run(&probs, &[0.0; 8], &anchors, &production(3)).unwrap_err();
    assert_eq!(err, AnchorBoxError::TopKExceedsClasses { top_k: 3, width: 2 });
}

#[test]
fn nms_removes_the_lower_scoring_duplicate() {
    let boxes = [
        BoundingBox::new(0.1, 0.1, 0.5, 0.5),
        BoundingBox::new(0.12, 0.1, 0.52, 0.5),
    ];
    assert_eq!(nms_boxes(&boxes, &[0.3, 0.7], 0.5, 10), vec![1]);
    assert_eq!(nms_boxes(&boxes, &[0.7, 0.3], 0.5, 10), vec![0]);
}

#[test]
fn nms_is_idempotent_on_random_boxes() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..20 {
        let n = rng.random_range(1..60);
        let mut boxes = Vec::with_capacity(n);
        let mut scores = Vec::with_capacity(n);
        for _ in 0..n {
            let y: f32 = rng.random_range(0.0..0.8);
            let x: f32 = rng.random_range(0.0..0.8);
            let h: f32 = rng.random_range(0.01..0.3);
            let w: f32 = rng.random_range(0.01..0.3);
            boxes.push(BoundingBox::new(y, x, y + h, x + w));
            scores.push(rng.random_range(0.0..1.0f32));
        }

        let kept = nms_boxes(&boxes, &scores, 0.4, usize::MAX);
        let kept_boxes: Vec<BoundingBox> = kept.iter().map(|&i| boxes[i]).collect();
        let kept_scores: Vec<f32> = kept.iter().map(|&i| scores[i]).collect();

        let again = nms_boxes(&kept_boxes, &kept_scores, 0.4, usize::MAX);
        let expected: Vec<usize> = (0..kept.len()).collect();
        assert_eq!(again, expected);
    }
}
