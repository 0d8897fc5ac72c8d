//! # camviz_transforms
//!
//! Image transforms on both sides of the classifier.
//!
//! This crate provides:
//! - Preprocessing of decoded RGB images into normalized input tensors
//! - Bilinear upsampling of coarse relevance maps to image resolution
//! - Colormaps and weighted blending for heatmap overlays
//!
//! ## Overlay Example
//!
//! ```rust,ignore
//! use camviz_transforms::{HeatmapOverlay, ImagePreprocessor};
//! use camviz_core::{ExplainConfig, PreprocessConfig};
//!
//! let preprocessor = ImagePreprocessor::new(PreprocessConfig::default())?;
//! let original = preprocessor.load_rgb("photo.jpg")?;
//! let input = preprocessor.to_tensor::<B>(&original, &device);
//!
//! let overlay = HeatmapOverlay::from_config(&ExplainConfig::default());
//! let heatmap = overlay.render(&original, &relevance)?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod colormap;
pub mod preprocess;
pub mod resize;

pub use colormap::{blend, Colormap, HeatmapOverlay};
pub use preprocess::ImagePreprocessor;
pub use resize::upsample_bilinear;
