//! Low-level building blocks for custom post-processing pipelines.
//!
//! These expose the individual stages behind [`crate::Detector`]: decoding,
//! suppression, class ranking, per-crop selection and batch assembly. Most
//! users should prefer the `Detector` facade.

pub use crate::anchor::LevelGrid;
pub use crate::batch::assemble;
#[cfg(feature = "rayon")]
pub use crate::batch::rayon::assemble_par;
pub use crate::candidate::nms::nms_boxes;
pub use crate::candidate::select::{select, SelectionParams};
pub use crate::candidate::topk::{top_k_classes, ClassScore, TopK};
pub use crate::codec::{decode, decode_all, encode};
