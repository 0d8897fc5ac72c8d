//! # camviz_core
//!
//! Core types and traits for camviz image classification explanations.
//!
//! This crate provides:
//! - [`ObservableClassifier`] and [`LayerProbe`], the contract a convolutional
//!   classifier implements so one of its internal layers can be observed
//! - Layer path resolution ([`resolve_layer_path`])
//! - Preprocessing and explanation configuration
//! - Error types and backend aliases
//!
//! ## Shape Convention
//!
//! Image tensors follow the convention `(B, C, H, W)`:
//! - `B`: Batch size
//! - `C`: Channels (3 for RGB input, feature maps inside the network)
//! - `H`, `W`: Spatial height and width
//!
//! ## Example
//!
//! ```rust,ignore
//! use camviz_core::{resolve_layer_path, ExplainConfig};
//!
//! let names = model.layer_names();
//! let layer = resolve_layer_path("layer4.-1.conv3", &names)?;
//! let config = ExplainConfig::default().with_threshold(0.6);
//! config.validate()?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod error;
mod layer;
mod model_trait;

pub use config::{
    read_json_config, ColormapKind, ExplainConfig, HeatmapFormat, PreprocessConfig,
    BLEND_TOLERANCE,
};
pub use error::{CoreError, Result};
pub use layer::resolve_layer_path;
pub use model_trait::{LayerProbe, ObservableClassifier, PassThrough};

/// Backend type aliases for convenience
pub mod backend {
    #[cfg(feature = "backend-ndarray")]
    pub use burn_ndarray::{NdArray, NdArrayDevice};

    pub use burn_autodiff::Autodiff;

    /// CPU backend with gradient support, used for explanation passes.
    #[cfg(feature = "backend-ndarray")]
    pub type CpuAutodiff = Autodiff<NdArray>;
}
