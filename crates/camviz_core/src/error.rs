//! Error types for camviz_core.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors that can occur in camviz_core operations.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A configuration value is out of range or inconsistent.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The requested layer path does not exist in the network.
    #[error("Layer not found: '{layer}' ({available} tappable layers available)")]
    LayerNotFound {
        /// The layer path as requested.
        layer: String,
        /// Number of tappable layers the network exposes.
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

    /// Shape mismatch between tensors or images.
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Input image file does not exist.
    #[error("Image not found: {}", .0.display())]
    ImageNotFound(PathBuf),

    /// Input image exists but could not be read or decoded.
    #[error("Failed to decode image {}: {reason}", .path.display())]
    ImageDecode {
        /// Path of the image.
        path: PathBuf,
        /// Decoder message.
        reason: String,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Generic error.
    #[error("{0}")]
    Other(String),
}
