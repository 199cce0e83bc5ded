//! Candidate selection and pruning.
//!
//! Includes objectness thresholding, greedy IoU suppression, and Top-K class
//! ranking.

pub(crate) mod nms;
pub(crate) mod select;
pub(crate) mod topk;
