//! Error types for anchorbox.

use thiserror::Error;

/// Result alias for anchorbox operations.
pub type AnchorBoxResult<T> = std::result::Result<T, AnchorBoxError>;

/// Coarse classification of an [`AnchorBoxError`].
///
/// Configuration errors are fatal at startup: anchors cannot be generated or
/// the detector cannot be built. Shape errors are fatal for a single frame and
/// indicate a mismatch between the model outputs and the configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid configuration.
    Config,
    /// Model outputs disagree with the configured geometry.
    Shape,
}

/// Errors that can occur when generating anchors or post-processing outputs.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum AnchorBoxError {
    /// No pyramid levels were configured.
    #[error("anchor configuration has no levels")]
    EmptyLevels,
    /// No anchor scales were configured.
    #[error("anchor configuration has no scales")]
    EmptyScales,
    /// No aspect ratios were configured.
    #[error("anchor configuration has no aspect ratios")]
    EmptyAspectRatios,
    /// Parallel per-level lists have different lengths.
    #[error("level lists differ in length: {base_sizes} base sizes vs {strides} strides")]
    LevelListMismatch { base_sizes: usize, strides: usize },
    /// The input resolution is not an exact multiple of a level stride.
    #[error("level {level}: input extent {extent} is not divisible by stride {stride}")]
    IndivisibleStride {
        level: usize,
        extent: usize,
        stride: usize,
    },
    /// A numeric configuration parameter is out of range.
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter {
        name: &'static str,
        reason: &'static str,
    },
    /// A model output has the wrong number of rows.
    #[error("{context}: expected {expected} rows, got {got}")]
    RowCountMismatch {
        expected: usize,
        got: usize,
        context: &'static str,
    },
    /// A model output row has the wrong width.
    #[error("{context}: expected row width {expected}, got {got}")]
    RowWidthMismatch {
        expected: usize,
        got: usize,
        context: &'static str,
    },
    /// A flat buffer does not match the declared geometry.
    #[error("{context}: expected {expected} values, got {got}")]
    BufferLengthMismatch {
        expected: usize,
        got: usize,
        context: &'static str,
    },
    /// More classes were requested than the probability vector holds.
    #[error("top_k {top_k} exceeds class vector width {width}")]
    TopKExceedsClasses { top_k: usize, width: usize },
}

impl AnchorBoxError {
    /// Returns whether this is a configuration or a shape error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnchorBoxError::EmptyLevels
            | AnchorBoxError::EmptyScales
            | AnchorBoxError::EmptyAspectRatios
            | AnchorBoxError::LevelListMismatch { .. }
            | AnchorBoxError::IndivisibleStride { .. }
            | AnchorBoxError::InvalidParameter { .. } => ErrorKind::Config,
            AnchorBoxError::RowCountMismatch { .. }
            | AnchorBoxError::RowWidthMismatch { .. }
            | AnchorBoxError::BufferLengthMismatch { .. }
            | AnchorBoxError::TopKExceedsClasses { .. } => ErrorKind::Shape,
        }
    }

    /// Shorthand for `kind() == ErrorKind::Config`.
    pub fn is_config(&self) -> bool {
        self.kind() == ErrorKind::Config
    }

    /// Shorthand for `kind() == ErrorKind::Shape`.
    pub fn is_shape(&self) -> bool {
        self.kind() == ErrorKind::Shape
    }
}
