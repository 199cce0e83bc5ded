//! Corner-form bounding boxes and overlap measures.

/// Axis-aligned box in corner form `(y1, x1, y2, x2)`.
///
/// Coordinates are normalized unless the box was produced by
/// [`BoundingBox::scaled`]. Nothing enforces `y1 <= y2` or `x1 <= x2`; an
/// inverted box simply has zero area.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub y1: f32,
    pub x1: f32,
    pub y2: f32,
    pub x2: f32,
}

impl BoundingBox {
    /// Placeholder box used by sentinel detections.
    pub const SENTINEL: BoundingBox = BoundingBox {
        y1: -1.0,
        x1: -1.0,
        y2: -1.0,
        x2: -1.0,
    };

    /// Creates a box from corner coordinates.
    pub fn new(y1: f32, x1: f32, y2: f32, x2: f32) -> Self {
        Self { y1, x1, y2, x2 }
    }

    /// Creates a box from its center and extent.
    pub fn from_center(center_y: f32, center_x: f32, height: f32, width: f32) -> Self {
        let half_h = height / 2.0;
        let half_w = width / 2.0;
        Self {
            y1: center_y - half_h,
            x1: center_x - half_w,
            y2: center_y + half_h,
            x2: center_x + half_w,
        }
    }

    /// Returns `(center_y, center_x, height, width)`.
    pub fn center_form(&self) -> (f32, f32, f32, f32) {
        (
            (self.y1 + self.y2) / 2.0,
            (self.x1 + self.x2) / 2.0,
            self.y2 - self.y1,
            self.x2 - self.x1,
        )
    }

    /// Area, with inverted or degenerate boxes counted as zero.
    pub fn area(&self) -> f32 {
        (self.y2 - self.y1).max(0.0) * (self.x2 - self.x1).max(0.0)
    }

    /// Area of the overlap with `other`.
    pub fn intersection(&self, other: &BoundingBox) -> f32 {
        let h = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let w = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        h * w
    }

    /// Intersection over union. Zero when the union is empty.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let inter = self.intersection(other);
        if inter <= 0.0 {
            return 0.0;
        }
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            return 0.0;
        }
        inter / union
    }

    /// Clamps every coordinate into `[0, 1]`.
    pub fn clipped(&self) -> Self {
        Self {
            y1: self.y1.clamp(0.0, 1.0),
            x1: self.x1.clamp(0.0, 1.0),
            y2: self.y2.clamp(0.0, 1.0),
            x2: self.x2.clamp(0.0, 1.0),
        }
    }

    /// Multiplies by `(height, width, height, width)`.
    pub fn scaled(&self, height: f32, width: f32) -> Self {
        Self {
            y1: self.y1 * height,
            x1: self.x1 * width,
            y2: self.y2 * height,
            x2: self.x2 * width,
        }
    }

    /// Returns `[y1, x1, y2, x2]`.
    pub fn to_array(&self) -> [f32; 4] {
        [self.y1, self.x1, self.y2, self.x2]
    }
}

impl From<[f32; 4]> for BoundingBox {
    fn from(v: [f32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

#[cfg(test)]
mod tests {
    use super::BoundingBox;

    #[test]
    fn iou_of_half_overlap() {
        let a = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        let b = BoundingBox::new(0.0, 0.5, 1.0, 1.5);
        assert!((a.iou(&b) - 1.0 / 3.0).abs() < 1e-6);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn disjoint_boxes_have_zero_iou() {
        let a = BoundingBox::new(0.0, 0.0, 0.2, 0.2);
        let b = BoundingBox::new(0.5, 0.5, 0.7, 0.7);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn inverted_box_has_zero_area() {
        let inverted = BoundingBox::new(0.6, 0.6, 0.4, 0.4);
        assert_eq!(inverted.area(), 0.0);
        let point = BoundingBox::new(0.5, 0.5, 0.5, 0.5);
        assert_eq!(point.iou(&point), 0.0);
    }

    #[test]
    fn clipping_and_scaling() {
        let b = BoundingBox::new(-0.1, 0.2, 0.5, 1.3).clipped();
        assert_eq!(b.to_array(), [0.0, 0.2, 0.5, 1.0]);
        let s = BoundingBox::new(0.25, 0.5, 0.75, 1.0).scaled(320.0, 640.0);
        assert_eq!(s.to_array(), [80.0, 320.0, 240.0, 640.0]);
    }

    #[test]
    fn center_form_round_trips() {
        let b = BoundingBox::from_center(0.5, 0.25, 0.2, 0.1);
        let (cy, cx, h, w) = b.center_form();
        assert!((cy - 0.5).abs() < 1e-6);
        assert!((cx - 0.25).abs() < 1e-6);
        assert!((h - 0.2).abs() < 1e-6);
        assert!((w - 0.1).abs() < 1e-6);
    }
}
