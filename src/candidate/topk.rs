//! Top-K class ranking for a single probability vector.

use crate::util::math::score_desc_index_asc;
use crate::util::{AnchorBoxError, AnchorBoxResult};
use std::cmp::Ordering;

/// A class id with its probability.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClassScore {
    /// Column in the probability vector (0 = background).
    pub class_id: u32,
    /// Probability of the class.
    pub score: f32,
}

fn class_cmp_desc(a: &ClassScore, b: &ClassScore) -> Ordering {
    score_desc_index_asc(
        (a.score, a.class_id as usize),
        (b.score, b.class_id as usize),
    )
}

/// Top-K container with O(k) insertion cost.
pub struct TopK {
    k: usize,
    items: Vec<ClassScore>,
}

impl TopK {
    /// Creates a new Top-K collector.
    pub fn new(k: usize) -> Self {
        Self {
            k,
            items: Vec::with_capacity(k),
        }
    }

    /// Pushes a class score, evicting the current worst if at capacity.
    pub fn push(&mut self, item: ClassScore) {
        if self.k == 0 {
            return;
        }
        if self.items.len() < self.k {
            self.items.push(item);
            return;
        }

        let mut worst_idx = 0usize;
        for (idx, current) in self.items.iter().enumerate().skip(1) {
            if class_cmp_desc(current, &self.items[worst_idx]) == Ordering::Greater {
                worst_idx = idx;
            }
        }

        if class_cmp_desc(&item, &self.items[worst_idx]) == Ordering::Less {
            self.items[worst_idx] = item;
        }
    }

    /// Returns the kept items, best first.
    pub fn into_sorted_desc(mut self) -> Vec<ClassScore> {
        self.items.sort_by(class_cmp_desc);
        self.items
    }
}

/// Extracts the `k` most probable classes of `probs` as `(ids, scores)`.
///
/// Scores are descending; equal scores keep the lower class id first. The
/// background column takes part like any other class.
pub fn top_k_classes(probs: &[f32], k: usize) -> AnchorBoxResult<(Vec<u32>, Vec<f32>)> {
    if k > probs.len() {
        return Err(AnchorBoxError::TopKExceedsClasses {
            top_k: k,
            width: probs.len(),
        });
    }
    let mut topk = TopK::new(k);
    for (class_id, &score) in probs.iter().enumerate() {
        topk.push(ClassScore {
            class_id: class_id as u32,
            score,
        });
    }
    Ok(topk
        .into_sorted_desc()
        .into_iter()
        .map(|c| (c.class_id, c.score))
        .unzip())
}
