//! # camviz
//!
//! Visual explanations for convolutional image classifiers in Rust.
//!
//! camviz classifies an image, picks every class whose score clears a
//! threshold and, for each, renders a Grad-CAM heatmap showing which regions
//! of the image drove that score:
//!
//! - **Core**: classifier and layer probe traits, layer paths, configuration
//! - **Transforms**: preprocessing, relevance map resizing, colormaps
//! - **Models**: bottleneck ResNet with observable layers, checkpoints
//! - **Explain**: activation/gradient capture, Grad-CAM, heatmap output
//! - **Analysis**: session statistics and result export
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use camviz::prelude::*;
//!
//! let config = ClassifierConfig::load("classifier.json")?;
//! let device = Default::default();
//! let model = config.load_classifier::<CpuAutodiff>(&device)?;
//!
//! let explainer = GradCamExplainer::new(
//!     model,
//!     config.labels.clone(),
//!     &config.target_layer,
//!     config.preprocess.clone(),
//!     config.explain.clone(),
//!     device,
//! )?;
//!
//! let explanation = explainer.explain(&ExplainRequest::new(
//!     "uploads/photo.jpg",
//!     "photo.jpg",
//!     "gradcam_outputs",
//! ))?;
//! println!("{:?}", explanation.urls());
//! ```
//!
//! ## Feature Flags
//!
//! - `backend-ndarray` (default): CPU backend using ndarray

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

// Re-export all crates
pub use camviz_analysis as analysis;
pub use camviz_core as core;
pub use camviz_explain as explain;
pub use camviz_models as models;
pub use camviz_transforms as transforms;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use camviz::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use camviz_core::{
        ColormapKind, CoreError, ExplainConfig, HeatmapFormat, LayerProbe, ObservableClassifier,
        PreprocessConfig,
    };

    #[cfg(feature = "backend-ndarray")]
    pub use camviz_core::backend::{CpuAutodiff, NdArray};

    // Transforms
    pub use camviz_transforms::{HeatmapOverlay, ImagePreprocessor};

    // Models
    pub use camviz_models::{ClassifierConfig, ModelCheckpoint, ResNet, ResNetConfig};

    // Explain
    pub use camviz_explain::{
        ExplainError, ExplainRequest, Explanation, GradCamExplainer, Prediction, RelevanceMap,
    };

    // Analysis
    pub use camviz_analysis::{SessionResults, SessionStats, StatsSummary};
}
