//! Anchor grid synthesis.
//!
//! Anchors are generated once per configuration and shared read-only by every
//! frame and crop. The model pairs output row `i` with anchor `i`, so the
//! generated order is part of the decode contract: levels in declared order,
//! cells row-major within a level, then scales × aspect ratios in declared
//! order (scales outermost). Reordering any of these lists is a breaking change.

mod grid;

pub use grid::LevelGrid;

use crate::bbox::BoundingBox;
use crate::trace::{trace_event, trace_span};
use crate::util::math::is_positive_finite;
use crate::util::{AnchorBoxError, AnchorBoxResult};
use std::ops::Range;

/// Reference box in normalized `[0, 1]` input coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Anchor {
    /// Vertical center.
    pub center_y: f32,
    /// Horizontal center.
    pub center_x: f32,
    /// Height relative to the input height.
    pub height: f32,
    /// Width relative to the input width.
    pub width: f32,
}

impl Anchor {
    /// Returns the anchor as a corner-form box.
    pub fn to_box(&self) -> BoundingBox {
        BoundingBox::from_center(self.center_y, self.center_x, self.height, self.width)
    }
}

/// One pyramid level of the anchor specification.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnchorLevel {
    /// Base anchor side length in input pixels.
    pub base_size: f32,
    /// Feature-map stride in input pixels.
    pub stride: usize,
}

/// Anchor specification. Must match the layout the model was trained with.
#[derive(Clone, Debug, PartialEq)]
pub struct AnchorConfig {
    /// Network input height in pixels.
    pub input_height: usize,
    /// Network input width in pixels.
    pub input_width: usize,
    /// Pyramid levels, in model output order.
    pub levels: Vec<AnchorLevel>,
    /// Multiplicative size factors applied to every level's base size.
    pub scales: Vec<f32>,
    /// Width / height ratios.
    pub aspect_ratios: Vec<f32>,
}

impl AnchorConfig {
    /// Builds a configuration from parallel per-level lists.
    ///
    /// Fails when `base_sizes` and `strides` differ in length.
    pub fn from_level_lists(
        input_height: usize,
        input_width: usize,
        base_sizes: &[f32],
        strides: &[usize],
        scales: Vec<f32>,
        aspect_ratios: Vec<f32>,
    ) -> AnchorBoxResult<Self> {
        if base_sizes.len() != strides.len() {
            return Err(AnchorBoxError::LevelListMismatch {
                base_sizes: base_sizes.len(),
                strides: strides.len(),
            });
        }
        let levels = base_sizes
            .iter()
            .zip(strides)
            .map(|(&base_size, &stride)| AnchorLevel { base_size, stride })
            .collect();
        Ok(Self {
            input_height,
            input_width,
            levels,
            scales,
            aspect_ratios,
        })
    }

    /// Number of anchors emitted per grid cell.
    pub fn anchors_per_cell(&self) -> usize {
        self.scales.len() * self.aspect_ratios.len()
    }

    /// Validates the configuration and returns the grid of every level.
    pub fn level_grids(&self) -> AnchorBoxResult<Vec<LevelGrid>> {
        if self.levels.is_empty() {
            return Err(AnchorBoxError::EmptyLevels);
        }
        if self.scales.is_empty() {
            return Err(AnchorBoxError::EmptyScales);
        }
        if self.aspect_ratios.is_empty() {
            return Err(AnchorBoxError::EmptyAspectRatios);
        }
        if self.input_height == 0 || self.input_width == 0 {
            return Err(AnchorBoxError::InvalidParameter {
                name: "input_resolution",
                reason: "must be non-zero",
            });
        }
        if !self.scales.iter().copied().all(is_positive_finite) {
            return Err(AnchorBoxError::InvalidParameter {
                name: "scales",
                reason: "must be positive and finite",
            });
        }
        if !self.aspect_ratios.iter().copied().all(is_positive_finite) {
            return Err(AnchorBoxError::InvalidParameter {
                name: "aspect_ratios",
                reason: "must be positive and finite",
            });
        }

        self.levels
            .iter()
            .enumerate()
            .map(|(idx, level)| {
                if !is_positive_finite(level.base_size) {
                    return Err(AnchorBoxError::InvalidParameter {
                        name: "base_anchor_size",
                        reason: "must be positive and finite",
                    });
                }
                LevelGrid::for_level(idx, level, self.input_height, self.input_width)
            })
            .collect()
    }

    /// Expected anchor count: Σ over levels of `rows × cols × |scales| × |ratios|`.
    pub fn anchor_count(&self) -> AnchorBoxResult<usize> {
        let per_cell = self.anchors_per_cell();
        Ok(self
            .level_grids()?
            .iter()
            .map(|grid| grid.cells() * per_cell)
            .sum())
    }
}

/// Ordered, immutable anchor list for one configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct AnchorSet {
    anchors: Vec<Anchor>,
    levels: Vec<Range<usize>>,
}

impl AnchorSet {
    /// Generates every anchor for `cfg` in model output order.
    pub fn generate(cfg: &AnchorConfig) -> AnchorBoxResult<Self> {
        let grids = cfg.level_grids()?;
        let per_cell = cfg.anchors_per_cell();
        let total = grids.iter().map(|grid| grid.cells() * per_cell).sum();
        let _span = trace_span!("generate_anchors", levels = grids.len()).entered();

        let mut anchors = Vec::with_capacity(total);
        let mut levels = Vec::with_capacity(grids.len());
        for (grid, level) in grids.iter().zip(&cfg.levels) {
            let start = anchors.len();
            grid.push_anchors(level.base_size, cfg, &mut anchors);
            levels.push(start..anchors.len());
        }
        debug_assert_eq!(anchors.len(), total);

        trace_event!("anchors_generated", count = anchors.len());
        Ok(Self { anchors, levels })
    }

    /// Number of anchors.
    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    /// Returns `true` if the set holds no anchors.
    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    /// All anchors in model output order.
    pub fn as_slice(&self) -> &[Anchor] {
        &self.anchors
    }

    /// Anchor at `index`, if any.
    pub fn get(&self, index: usize) -> Option<&Anchor> {
        self.anchors.get(index)
    }

    /// Number of pyramid levels.
    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// Index range occupied by `level` in the flat anchor list.
    pub fn level_range(&self, level: usize) -> Option<Range<usize>> {
        self.levels.get(level).cloned()
    }
}
