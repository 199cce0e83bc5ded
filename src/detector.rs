//! High-level detector facade.
//!
//! A [`Detector`] owns the anchors of one configuration and turns raw model
//! outputs of a crop batch into a [`DetectionBatch`]. It holds no per-frame
//! state, so a single instance can serve any number of frames and threads.

use crate::anchor::{AnchorConfig, AnchorSet};
use crate::batch::{assemble, DetectionBatch, PixelRows, PolicyKind, SelectionPolicy};
use crate::candidate::select::SelectionParams;
use crate::codec::ScaleFactors;
use crate::tensor::BatchOutputs;
use crate::util::{AnchorBoxError, AnchorBoxResult};

/// Post-processing configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectorConfig {
    /// Decode scale factors `(sy, sx, sh, sw)`.
    pub scale_factors: ScaleFactors,
    /// Classes retained per detection, unless the policy overrides it.
    pub top_k: usize,
    /// Expected foreground class count; checked against every batch when set.
    pub num_classes: Option<usize>,
    /// Policy used by [`Detector::visualize`].
    pub visualization: SelectionPolicy,
    /// Policy used by [`Detector::extract`].
    pub production: SelectionPolicy,
    /// Clip decoded boxes to `[0, 1]` before suppression.
    pub clip_boxes: bool,
    /// Process crops in parallel. Rejected by [`DetectorConfig::validate`]
    /// when the crate is built without the `rayon` feature.
    pub parallel: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            scale_factors: ScaleFactors::default(),
            top_k: 1,
            num_classes: None,
            visualization: SelectionPolicy::VISUALIZATION,
            production: SelectionPolicy::PRODUCTION,
            clip_boxes: false,
            parallel: false,
        }
    }
}

impl DetectorConfig {
    /// Validates every parameter.
    pub fn validate(&self) -> AnchorBoxResult<()> {
        self.scale_factors.validate()?;
        self.visualization.validate()?;
        self.production.validate()?;
        for kind in [PolicyKind::Visualization, PolicyKind::Production] {
            let top_k = self.top_k_for(kind);
            if top_k == 0 {
                return Err(AnchorBoxError::InvalidParameter {
                    name: "top_k",
                    reason: "must be at least 1",
                });
            }
            if let Some(num_classes) = self.num_classes {
                if top_k > num_classes.saturating_add(1) {
                    return Err(AnchorBoxError::InvalidParameter {
                        name: "top_k",
                        reason: "must not exceed num_classes + 1",
                    });
                }
            }
        }
        #[cfg(not(feature = "rayon"))]
        {
            if self.parallel {
                return Err(AnchorBoxError::InvalidParameter {
                    name: "parallel",
                    reason: "requires the rayon feature",
                });
            }
        }
        Ok(())
    }

    /// Classes retained per detection under `kind`.
    pub fn top_k_for(&self, kind: PolicyKind) -> usize {
        self.policy(kind).top_k.unwrap_or(self.top_k)
    }

    /// Returns the policy of `kind`.
    pub fn policy(&self, kind: PolicyKind) -> SelectionPolicy {
        match kind {
            PolicyKind::Visualization => self.visualization,
            PolicyKind::Production => self.production,
        }
    }

    /// Builds the per-crop selection parameters for `kind`.
    pub fn selection_params(&self, kind: PolicyKind) -> SelectionParams {
        let policy = self.policy(kind);
        SelectionParams {
            objectness_threshold: policy.objectness_threshold,
            iou_threshold: policy.iou_threshold,
            max_output: policy.max_output,
            top_k: self.top_k_for(kind),
            scale_factors: self.scale_factors,
            clip_boxes: self.clip_boxes,
        }
    }
}

/// Anchor-based detection post-processor.
pub struct Detector {
    anchors: AnchorSet,
    input_height: usize,
    input_width: usize,
    cfg: DetectorConfig,
}

impl Detector {
    /// Generates the anchors for `anchor_cfg` with the default configuration.
    ///
    /// Fails with a configuration error when the anchor layout is invalid.
    pub fn new(anchor_cfg: &AnchorConfig) -> AnchorBoxResult<Self> {
        let anchors = AnchorSet::generate(anchor_cfg)?;
        Ok(Self {
            anchors,
            input_height: anchor_cfg.input_height,
            input_width: anchor_cfg.input_width,
            cfg: DetectorConfig::default(),
        })
    }

    /// Replaces the post-processing configuration after validating it.
    pub fn with_config(mut self, cfg: DetectorConfig) -> AnchorBoxResult<Self> {
        cfg.validate()?;
        self.cfg = cfg;
        Ok(self)
    }

    /// Active configuration.
    pub fn config(&self) -> &DetectorConfig {
        &self.cfg
    }

    /// The shared anchor list.
    pub fn anchors(&self) -> &AnchorSet {
        &self.anchors
    }

    /// Network input resolution `(height, width)`.
    pub fn input_size(&self) -> (usize, usize) {
        (self.input_height, self.input_width)
    }

    /// Post-processes a batch under the given policy.
    ///
    /// Fails with a shape error if the outputs do not match the anchors or
    /// class count.
    pub fn detect(
        &self,
        outputs: &BatchOutputs<'_>,
        kind: PolicyKind,
    ) -> AnchorBoxResult<DetectionBatch> {
        if outputs.num_anchors() != self.anchors.len() {
            return Err(AnchorBoxError::RowCountMismatch {
                expected: self.anchors.len(),
                got: outputs.num_anchors(),
                context: "model outputs vs anchors",
            });
        }
        if let Some(num_classes) = self.cfg.num_classes {
            if outputs.num_classes() != num_classes {
                return Err(AnchorBoxError::RowWidthMismatch {
                    expected: num_classes.saturating_add(1),
                    got: outputs.num_classes() + 1,
                    context: "class probabilities",
                });
            }
        }

        let params = self.cfg.selection_params(kind);
        let anchors = self.anchors.as_slice();

        #[cfg(feature = "rayon")]
        {
            if self.cfg.parallel {
                return crate::batch::rayon::assemble_par(outputs, anchors, &params);
            }
        }

        assemble(outputs, anchors, &params)
    }

    /// Post-processes a batch with the visualization policy.
    pub fn visualize(&self, outputs: &BatchOutputs<'_>) -> AnchorBoxResult<DetectionBatch> {
        self.detect(outputs, PolicyKind::Visualization)
    }

    /// Post-processes a batch with the production policy.
    pub fn extract(&self, outputs: &BatchOutputs<'_>) -> AnchorBoxResult<DetectionBatch> {
        self.detect(outputs, PolicyKind::Production)
    }

    /// Production detections as pixel-space rows of the network input.
    pub fn extract_pixels(&self, outputs: &BatchOutputs<'_>) -> AnchorBoxResult<PixelRows> {
        let batch = self.extract(outputs)?;
        Ok(batch.to_pixel_rows(self.input_height as f32, self.input_width as f32))
    }
}
