//! Box regression decoding.
//!
//! Deltas follow the usual SSD parameterization: center offsets are relative to
//! the anchor extent, sizes are log-space ratios, and all four terms are
//! divided by fixed scale factors before use.

use crate::anchor::Anchor;
use crate::bbox::BoundingBox;
use crate::util::math::is_positive_finite;
use crate::util::{AnchorBoxError, AnchorBoxResult};

/// Divisors applied to `(dy, dx, dh, dw)` before decoding.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScaleFactors {
    pub y: f32,
    pub x: f32,
    pub h: f32,
    pub w: f32,
}

impl Default for ScaleFactors {
    fn default() -> Self {
        Self {
            y: 10.0,
            x: 10.0,
            h: 5.0,
            w: 5.0,
        }
    }
}

impl ScaleFactors {
    /// Creates scale factors from a `(sy, sx, sh, sw)` array.
    pub fn from_array(v: [f32; 4]) -> Self {
        Self {
            y: v[0],
            x: v[1],
            h: v[2],
            w: v[3],
        }
    }

    /// Rejects zero, negative, or non-finite factors.
    pub fn validate(&self) -> AnchorBoxResult<()> {
        if [self.y, self.x, self.h, self.w]
            .into_iter()
            .all(is_positive_finite)
        {
            Ok(())
        } else {
            Err(AnchorBoxError::InvalidParameter {
                name: "scale_factors",
                reason: "must be positive and finite",
            })
        }
    }
}

/// Raw regression output for one anchor.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RegressionDelta {
    pub dy: f32,
    pub dx: f32,
    pub dh: f32,
    pub dw: f32,
}

impl RegressionDelta {
    /// Reads a delta from a 4-wide model output row.
    pub fn from_row(row: &[f32]) -> AnchorBoxResult<Self> {
        match *row {
            [dy, dx, dh, dw] => Ok(Self { dy, dx, dh, dw }),
            _ => Err(AnchorBoxError::RowWidthMismatch {
                expected: 4,
                got: row.len(),
                context: "regression delta",
            }),
        }
    }

    /// Returns `[dy, dx, dh, dw]`.
    pub fn to_array(&self) -> [f32; 4] {
        [self.dy, self.dx, self.dh, self.dw]
    }
}

/// Decodes a delta against its anchor. The result is not clipped.
pub fn decode(delta: RegressionDelta, anchor: &Anchor, sf: ScaleFactors) -> BoundingBox {
    let center_y = anchor.center_y + (delta.dy / sf.y) * anchor.height;
    let center_x = anchor.center_x + (delta.dx / sf.x) * anchor.width;
    let height = (delta.dh / sf.h).exp() * anchor.height;
    let width = (delta.dw / sf.w).exp() * anchor.width;
    BoundingBox::from_center(center_y, center_x, height, width)
}

/// Encodes `bbox` relative to `anchor`; the inverse of [`decode`].
///
/// Boxes or anchors with non-positive extent produce non-finite size terms.
pub fn encode(bbox: &BoundingBox, anchor: &Anchor, sf: ScaleFactors) -> RegressionDelta {
    let (center_y, center_x, height, width) = bbox.center_form();
    RegressionDelta {
        dy: (center_y - anchor.center_y) / anchor.height * sf.y,
        dx: (center_x - anchor.center_x) / anchor.width * sf.x,
        dh: (height / anchor.height).ln() * sf.h,
        dw: (width / anchor.width).ln() * sf.w,
    }
}

/// Decodes aligned delta and anchor lists.
///
/// Fails with a shape error when the lists are not 1:1.
pub fn decode_all(
    deltas: &[RegressionDelta],
    anchors: &[Anchor],
    sf: ScaleFactors,
) -> AnchorBoxResult<Vec<BoundingBox>> {
    if deltas.len() != anchors.len() {
        return Err(AnchorBoxError::RowCountMismatch {
            expected: anchors.len(),
            got: deltas.len(),
            context: "deltas vs anchors",
        });
    }
    Ok(deltas
        .iter()
        .zip(anchors)
        .map(|(&delta, anchor)| decode(delta, anchor, sf))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::{RegressionDelta, ScaleFactors};

    #[test]
    fn delta_rows_must_be_four_wide() {
        let delta = RegressionDelta::from_row(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(delta.to_array(), [1.0, 2.0, 3.0, 4.0]);
        assert!(RegressionDelta::from_row(&[1.0, 2.0, 3.0])
            .unwrap_err()
            .is_shape());
    }

    #[test]
    fn zero_scale_factor_is_rejected() {
        assert!(ScaleFactors::default().validate().is_ok());
        let sf = ScaleFactors::from_array([10.0, 0.0, 5.0, 5.0]);
        assert!(sf.validate().unwrap_err().is_config());
    }
}
