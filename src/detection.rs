//! Final detection records.

use crate::bbox::BoundingBox;

/// One surviving box with its top-K class ranking.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    /// Decoded box, normalized coordinates.
    pub bbox: BoundingBox,
    /// Class ids, best first. Index 0 is the background class.
    pub class_ids: Vec<u32>,
    /// Class probabilities matching `class_ids`, descending.
    pub class_scores: Vec<f32>,
}

impl Detection {
    /// Placeholder row for a crop without detections: box `-1`, scores `-1`,
    /// class ids `0`.
    pub fn sentinel(top_k: usize) -> Self {
        Self {
            bbox: BoundingBox::SENTINEL,
            class_ids: vec![0; top_k],
            class_scores: vec![-1.0; top_k],
        }
    }

    /// Returns `true` for rows built by [`Detection::sentinel`].
    pub fn is_sentinel(&self) -> bool {
        self.bbox == BoundingBox::SENTINEL
            && self.class_ids.iter().all(|&id| id == 0)
            && self.class_scores.iter().all(|&score| score == -1.0)
    }

    /// Best class id, if any.
    pub fn top_class(&self) -> Option<u32> {
        self.class_ids.first().copied()
    }

    /// Best class probability, if any.
    pub fn top_score(&self) -> Option<f32> {
        self.class_scores.first().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::Detection;
    use crate::bbox::BoundingBox;

    #[test]
    fn sentinel_has_fixed_width() {
        let det = Detection::sentinel(3);
        assert!(det.is_sentinel());
        assert_eq!(det.class_ids, vec![0, 0, 0]);
        assert_eq!(det.class_scores, vec![-1.0, -1.0, -1.0]);
        assert_eq!(det.bbox, BoundingBox::SENTINEL);
    }

    #[test]
    fn real_detection_is_not_sentinel() {
        let det = Detection {
            bbox: BoundingBox::new(0.1, 0.1, 0.2, 0.2),
            class_ids: vec![4],
            class_scores: vec![0.8],
        };
        assert!(!det.is_sentinel());
        assert_eq!(det.top_class(), Some(4));
        assert_eq!(det.top_score(), Some(0.8));
    }
}
