//! Borrowed views over flat model outputs.
//!
//! `OutputView` is a row-major 2D view into a 1D `f32` buffer: one row per
//! anchor. `BatchOutputs` holds the whole batch as two flat buffers and splits
//! it per crop in input order, without copying.

use crate::util::{AnchorBoxError, AnchorBoxResult};

/// Borrowed row-major `rows × cols` view.
#[derive(Copy, Clone, Debug)]
pub struct OutputView<'a> {
    data: &'a [f32],
    rows: usize,
    cols: usize,
}

impl<'a> OutputView<'a> {
    /// Creates a view over exactly `rows * cols` values.
    pub fn from_slice(data: &'a [f32], rows: usize, cols: usize) -> AnchorBoxResult<Self> {
        if cols == 0 {
            return Err(AnchorBoxError::RowWidthMismatch {
                expected: 1,
                got: 0,
                context: "output view",
            });
        }
        let needed = rows.checked_mul(cols).ok_or(AnchorBoxError::BufferLengthMismatch {
            expected: usize::MAX,
            got: data.len(),
            context: "output view",
        })?;
        if data.len() != needed {
            return Err(AnchorBoxError::BufferLengthMismatch {
                expected: needed,
                got: data.len(),
                context: "output view",
            });
        }
        Ok(Self { data, rows, cols })
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Row width.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Backing slice.
    pub fn as_slice(&self) -> &'a [f32] {
        self.data
    }

    /// Returns row `row`, or `None` when out of range.
    pub fn row(&self, row: usize) -> Option<&'a [f32]> {
        if row >= self.rows {
            return None;
        }
        let start = row * self.cols;
        self.data.get(start..start + self.cols)
    }

    /// Iterates over rows in order.
    pub fn iter_rows(&self) -> impl Iterator<Item = &'a [f32]> + 'a {
        self.data.chunks_exact(self.cols)
    }

    /// Fails unless the view is `rows × cols`.
    pub(crate) fn expect_shape(
        &self,
        rows: usize,
        cols: usize,
        context: &'static str,
    ) -> AnchorBoxResult<()> {
        if self.rows != rows {
            return Err(AnchorBoxError::RowCountMismatch {
                expected: rows,
                got: self.rows,
                context,
            });
        }
        if self.cols != cols {
            return Err(AnchorBoxError::RowWidthMismatch {
                expected: cols,
                got: self.cols,
                context,
            });
        }
        Ok(())
    }
}

/// Per-crop model outputs: class probabilities and regression deltas.
#[derive(Copy, Clone, Debug)]
pub struct CropOutputs<'a> {
    /// `num_anchors × (1 + num_classes)` probabilities, column 0 = background.
    pub class_probs: OutputView<'a>,
    /// `num_anchors × 4` deltas.
    pub deltas: OutputView<'a>,
}

/// Model outputs for a whole batch of crops, crop-major.
#[derive(Copy, Clone, Debug)]
pub struct BatchOutputs<'a> {
    class_probs: &'a [f32],
    deltas: &'a [f32],
    num_crops: usize,
    num_anchors: usize,
    prob_width: usize,
}

impl<'a> BatchOutputs<'a> {
    /// Wraps flat batch buffers.
    ///
    /// `class_probs` must hold `num_crops × num_anchors × (1 + num_classes)`
    /// values and `deltas` must hold `num_crops × num_anchors × 4`.
    pub fn new(
        class_probs: &'a [f32],
        deltas: &'a [f32],
        num_crops: usize,
        num_anchors: usize,
        num_classes: usize,
    ) -> AnchorBoxResult<Self> {
        let overflow = |got: usize, context: &'static str| AnchorBoxError::BufferLengthMismatch {
            expected: usize::MAX,
            got,
            context,
        };
        let rows = num_crops
            .checked_mul(num_anchors)
            .ok_or_else(|| overflow(class_probs.len(), "class probabilities"))?;
        let prob_width = num_classes
            .checked_add(1)
            .ok_or_else(|| overflow(class_probs.len(), "class probabilities"))?;
        let expected_probs = rows
            .checked_mul(prob_width)
            .ok_or_else(|| overflow(class_probs.len(), "class probabilities"))?;
        if class_probs.len() != expected_probs {
            return Err(AnchorBoxError::BufferLengthMismatch {
                expected: expected_probs,
                got: class_probs.len(),
                context: "class probabilities",
            });
        }
        let expected_deltas = rows
            .checked_mul(4)
            .ok_or_else(|| overflow(deltas.len(), "regression deltas"))?;
        if deltas.len() != expected_deltas {
            return Err(AnchorBoxError::BufferLengthMismatch {
                expected: expected_deltas,
                got: deltas.len(),
                context: "regression deltas",
            });
        }
        Ok(Self {
            class_probs,
            deltas,
            num_crops,
            num_anchors,
            prob_width,
        })
    }

    /// Number of crops in the batch.
    pub fn num_crops(&self) -> usize {
        self.num_crops
    }

    /// Anchors per crop.
    pub fn num_anchors(&self) -> usize {
        self.num_anchors
    }

    /// Foreground classes (probability width minus the background column).
    pub fn num_classes(&self) -> usize {
        self.prob_width - 1
    }

    /// Returns the outputs of crop `idx`.
    pub fn crop(&self, idx: usize) -> Option<CropOutputs<'a>> {
        if idx >= self.num_crops {
            return None;
        }
        let prob_len = self.num_anchors * self.prob_width;
        let delta_len = self.num_anchors * 4;
        let probs = self.class_probs.get(idx * prob_len..(idx + 1) * prob_len)?;
        let deltas = self.deltas.get(idx * delta_len..(idx + 1) * delta_len)?;
        Some(CropOutputs {
            class_probs: OutputView {
                data: probs,
                rows: self.num_anchors,
                cols: self.prob_width,
            },
            deltas: OutputView {
                data: deltas,
                rows: self.num_anchors,
                cols: 4,
            },
        })
    }

    /// Iterates over crops in input order.
    pub fn crops(&self) -> impl Iterator<Item = CropOutputs<'a>> + '_ {
        (0..self.num_crops).filter_map(move |idx| self.crop(idx))
    }
}
