//! Rayon-parallel batch assembly (feature-gated).
//!
//! Crops share only the read-only anchor list, so each crop is an independent
//! task. The indexed collect keeps crop input order.

use crate::anchor::Anchor;
use crate::batch::{fill_sentinel, DetectionBatch};
use crate::candidate::select::{select, SelectionParams};
use crate::tensor::BatchOutputs;
use crate::trace::{trace_event, trace_span};
use crate::util::{AnchorBoxError, AnchorBoxResult};
use rayon::prelude::*;

/// Crop-parallel counterpart of [`crate::batch::assemble`].
pub fn assemble_par(
    outputs: &BatchOutputs<'_>,
    anchors: &[Anchor],
    params: &SelectionParams,
) -> AnchorBoxResult<DetectionBatch> {
    let _span = trace_span!("assemble", crops = outputs.num_crops(), parallel = true).entered();

    let crops = (0..outputs.num_crops())
        .into_par_iter()
        .map(|idx| {
            let crop = outputs.crop(idx).ok_or(AnchorBoxError::RowCountMismatch {
                expected: outputs.num_crops(),
                got: idx,
                context: "crop index",
            })?;
            let detections = select(crop, anchors, params)?;
            Ok(fill_sentinel(detections, params.top_k))
        })
        .collect::<AnchorBoxResult<Vec<_>>>()?;

    let batch = DetectionBatch::from_crops(crops);
    trace_event!("batch_assembled", crops = batch.len(), rows = batch.total_rows());
    Ok(batch)
}
