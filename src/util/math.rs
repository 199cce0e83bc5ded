//! Numeric helpers shared by suppression and class ranking.

use std::cmp::Ordering;

/// Orders `(score, index)` pairs by descending score, lower index first on ties.
///
/// Uses `total_cmp` so NaN scores sort deterministically instead of poisoning
/// the comparison.
pub(crate) fn score_desc_index_asc(a: (f32, usize), b: (f32, usize)) -> Ordering {
    b.0.total_cmp(&a.0).then_with(|| a.1.cmp(&b.1))
}

/// Returns `true` for finite, strictly positive values.
pub(crate) fn is_positive_finite(value: f32) -> bool {
    value.is_finite() && value > 0.0
}

/// Returns `true` for values inside the closed unit interval.
pub(crate) fn is_unit(value: f32) -> bool {
    (0.0..=1.0).contains(&value)
}
