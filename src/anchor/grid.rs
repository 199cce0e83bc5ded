//! Per-level anchor grids.

use crate::anchor::{Anchor, AnchorConfig, AnchorLevel};
use crate::util::{AnchorBoxError, AnchorBoxResult};

/// Feature-map grid of a single pyramid level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LevelGrid {
    /// Number of cell rows (`input_height / stride`).
    pub rows: usize,
    /// Number of cell columns (`input_width / stride`).
    pub cols: usize,
    /// Stride in input pixels.
    pub stride: usize,
}

impl LevelGrid {
    /// Derives the grid of `level` for an input of `input_height × input_width`.
    ///
    /// Fails when the stride is zero or does not divide either extent exactly.
    pub fn for_level(
        level_idx: usize,
        level: &AnchorLevel,
        input_height: usize,
        input_width: usize,
    ) -> AnchorBoxResult<Self> {
        if level.stride == 0 {
            return Err(AnchorBoxError::InvalidParameter {
                name: "stride",
                reason: "must be non-zero",
            });
        }
        for extent in [input_height, input_width] {
            if extent % level.stride != 0 {
                return Err(AnchorBoxError::IndivisibleStride {
                    level: level_idx,
                    extent,
                    stride: level.stride,
                });
            }
        }
        Ok(Self {
            rows: input_height / level.stride,
            cols: input_width / level.stride,
            stride: level.stride,
        })
    }

    /// Number of grid cells.
    pub fn cells(&self) -> usize {
        self.rows * self.cols
    }

    /// Appends this level's anchors to `out`.
    ///
    /// Cells are visited row-major; inside a cell every scale is paired with
    /// every aspect ratio, scales outermost, both in declared order.
    pub(crate) fn push_anchors(&self, base_size: f32, cfg: &AnchorConfig, out: &mut Vec<Anchor>) {
        let input_h = cfg.input_height as f32;
        let input_w = cfg.input_width as f32;
        let stride = self.stride as f32;

        let shapes: Vec<(f32, f32)> = cfg
            .scales
            .iter()
            .flat_map(|&scale| {
                cfg.aspect_ratios.iter().map(move |&ratio| {
                    let side = base_size * scale;
                    let ratio_sqrt = ratio.sqrt();
                    (side / ratio_sqrt / input_h, side * ratio_sqrt / input_w)
                })
            })
            .collect();

        for row in 0..self.rows {
            let center_y = stride * (row as f32 + 0.5) / input_h;
            for col in 0..self.cols {
                let center_x = stride * (col as f32 + 0.5) / input_w;
                for &(height, width) in &shapes {
                    out.push(Anchor {
                        center_y,
                        center_x,
                        height,
                        width,
                    });
                }
            }
        }
    }
}
