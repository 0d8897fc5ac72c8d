//! Error types for camviz_explain.

use std::fmt;
use std::path::PathBuf;

use camviz_core::CoreError;
use thiserror::Error;

/// Result type alias using [`ExplainError`].
pub type Result<T> = std::result::Result<T, ExplainError>;

/// Which half of an observation was missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureKind {
    /// The forward pass never reached the observed layer.
    Activation,
    /// The backward pass produced no gradient for the observed layer.
    Gradient,
}

impl fmt::Display for CaptureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Activation => write!(f, "activation"),
            Self::Gradient => write!(f, "gradient"),
        }
    }
}

/// Errors raised while classifying or explaining an image.
#[derive(Error, Debug)]
pub enum ExplainError {
    /// A configuration value is out of range or inconsistent.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The target layer path does not exist in the classifier.
    #[error("Layer not found: '{layer}' ({available} tappable layers available)")]
    LayerNotFound {
        /// The layer path as requested.
        layer: String,
        /// Number of tappable layers the classifier exposes.
        available: usize,
    },

    /// The label list does not match the classifier's output width.
    #[error("Class count mismatch: {labels} labels for a classifier with {classes} outputs")]
    ClassCountMismatch {
        /// Number of labels supplied.
        labels: usize,
        /// Number of classifier outputs.
        classes: usize,
    },

    /// Input image file does not exist.
    #[error("Image not found: {}", .0.display())]
    ImageNotFound(PathBuf),

    /// Input image could not be read or decoded.
    #[error("Failed to decode image {}: {reason}", .path.display())]
    ImageDecode {
        /// Path of the image.
        path: PathBuf,
        /// Decoder message.
        reason: String,
    },

    /// A capture was empty when the relevance map was computed.
    #[error("No {0} was captured at the observed layer")]
    EmptyCapture(CaptureKind),

    /// A class index beyond the classifier's outputs.
    #[error("Class index {class_index} out of range for {n_classes} classes")]
    ClassOutOfRange {
        /// Requested class.
        class_index: usize,
        /// Number of classifier outputs.
        n_classes: usize,
    },

    /// Shape mismatch between tensors or images.
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// A heatmap could not be encoded or written.
    #[error("Failed to write heatmap {}: {reason}", .path.display())]
    Persist {
        /// Destination path.
        path: PathBuf,
        /// Encoder or file system message.
        reason: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error.
    #[error("{0}")]
    Other(String),
}

impl ExplainError {
    /// Whether the error concerns the request input rather than one class.
    #[must_use]
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::ImageNotFound(_) | Self::ImageDecode { .. })
    }
}

impl From<CoreError> for ExplainError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidConfig(msg) => Self::InvalidConfig(msg),
            CoreError::LayerNotFound { layer, available } => {
                Self::LayerNotFound { layer, available }
            }
            CoreError::ClassCountMismatch { labels, classes } => {
                Self::ClassCountMismatch { labels, classes }
            }
            CoreError::ShapeMismatch(msg) => Self::ShapeMismatch(msg),
            CoreError::ImageNotFound(path) => Self::ImageNotFound(path),
            CoreError::ImageDecode { path, reason } => Self::ImageDecode { path, reason },
            CoreError::IoError(e) => Self::Io(e),
            CoreError::SerializationError(msg) | CoreError::Other(msg) => Self::Other(msg),
        }
    }
}
