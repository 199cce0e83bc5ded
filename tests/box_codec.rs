use anchorbox::lowlevel::{decode, decode_all, encode};
use anchorbox::{Anchor, AnchorBoxError, BoundingBox, RegressionDelta, ScaleFactors};

fn anchor() -> Anchor {
    Anchor {
        center_y: 0.4,
        center_x: 0.6,
        height: 0.2,
        width: 0.1,
    }
}

fn assert_box_close(a: &BoundingBox, b: &BoundingBox, tol: f32) {
    for (x, y) in a.to_array().iter().zip(b.to_array().iter()) {
        assert!((x - y).abs() <= tol, "{a:?} vs {b:?}");
    }
}

#[test]
fn zero_delta_decodes_to_anchor() {
    let a = anchor();
    for sf in [
        ScaleFactors::default(),
        ScaleFactors::from_array([1.0, 1.0, 1.0, 1.0]),
        ScaleFactors::from_array([0.1, 3.0, 7.0, 0.5]),
    ] {
        let bbox = decode(RegressionDelta::default(), &a, sf);
        assert_box_close(&bbox, &a.to_box(), 1e-6);
    }
}

#[test]
fn decode_follows_the_parameterization() {
    let a = anchor();
    let sf = ScaleFactors::from_array([10.0, 10.0, 5.0, 5.0]);
    let delta = RegressionDelta {
        dy: 1.0,
        dx: -2.0,
        dh: 5.0 * 2.0f32.ln(),
        dw: 0.0,
    };
    let bbox = decode(delta, &a, sf);
    let (cy, cx, h, w) = bbox.center_form();
    assert!((cy - (0.4 + 0.1 * 0.2)).abs() < 1e-6);
    assert!((cx - (0.6 - 0.2 * 0.1)).abs() < 1e-6);
    assert!((h - 0.4).abs() < 1e-5);
    assert!((w - 0.1).abs() < 1e-6);
}

#[test]
fn encode_inverts_decode() {
    let a = anchor();
    let sf = ScaleFactors::default();
    let target = BoundingBox::new(0.25, 0.5, 0.45, 0.62);
    let delta = encode(&target, &a, sf);
    assert_box_close(&decode(delta, &a, sf), &target, 1e-5);
}

#[test]
fn decode_does_not_clip() {
    let a = Anchor {
        center_y: 0.05,
        center_x: 0.95,
        height: 0.2,
        width: 0.2,
    };
    let bbox = decode(RegressionDelta::default(), &a, ScaleFactors::default());
    assert!(bbox.y1 < 0.0);
    assert!(bbox.x2 > 1.0);
    let clipped = bbox.clipped();
    assert_eq!(clipped.y1, 0.0);
    assert_eq!(clipped.x2, 1.0);
}

#[test]
fn large_negative_size_delta_yields_tiny_but_valid_box() {
    let a = anchor();
    let delta = RegressionDelta {
        dy: 0.0,
        dx: 0.0,
        dh: -1000.0,
        dw: -1000.0,
    };
    let bbox = decode(delta, &a, ScaleFactors::from_array([1.0, 1.0, 1.0, 1.0]));
    assert!(bbox.y1.is_finite() && bbox.x2.is_finite());
    assert_eq!(bbox.area(), 0.0);
}

#[test]
fn decode_all_requires_alignment() {
    let anchors = [anchor(), anchor()];
    let deltas = [RegressionDelta::default()];
    let err = decode_all(&deltas, &anchors, ScaleFactors::default()).unwrap_err();
    assert_eq!(
        err,
        AnchorBoxError::RowCountMismatch {
            expected: 2,
            got: 1,
            context: "deltas vs anchors",
        }
    );
    assert!(err.is_shape());

    let boxes = decode_all(&[RegressionDelta::default(); 2], &anchors, ScaleFactors::default())
        .unwrap();
    assert_eq!(boxes.len(), 2);
}
