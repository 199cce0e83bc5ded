//! AnchorBox turns raw anchor-based detector outputs into final detections.
//!
//! Anchors are generated once from a multi-level, multi-scale,
//! multi-aspect-ratio specification. Each frame's per-anchor class
//! probabilities and regression deltas are then thresholded on objectness,
//! decoded, reduced by greedy IoU suppression and ranked by class, per crop.
//! Crops are optionally processed in parallel via the `rayon` feature.

pub mod anchor;
pub mod batch;
pub mod bbox;
mod candidate;
pub mod codec;
pub mod detection;
pub mod detector;
pub mod lowlevel;
pub mod tensor;
mod trace;
pub mod util;

pub use anchor::{Anchor, AnchorConfig, AnchorLevel, AnchorSet};
pub use batch::{DetectionBatch, PixelRows, PolicyKind, SelectionPolicy};
pub use bbox::BoundingBox;
pub use codec::{RegressionDelta, ScaleFactors};
pub use detection::Detection;
pub use detector::{Detector, DetectorConfig};
pub use tensor::{BatchOutputs, CropOutputs, OutputView};
pub use util::{AnchorBoxError, AnchorBoxResult, ErrorKind};

pub use candidate::select::SelectionParams;
