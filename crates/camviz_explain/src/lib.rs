//! # camviz_explain
//!
//! Grad-CAM explanations for convolutional image classifiers.
//!
//! This crate provides:
//! - [`ObservationRecord`], a layer probe capturing one layer's activation
//!   and the gradient of a class score with respect to it
//! - [`grad_cam`] and [`RelevanceMap`], the class relevance computation
//! - Target class selection and classification summaries
//! - Heatmap persistence and output directory housekeeping
//! - [`GradCamExplainer`], which ties them together behind a single-flight lock
//!
//! ## Example
//!
//! ```rust,ignore
//! use camviz_explain::{ExplainRequest, GradCamExplainer};
//!
//! let explainer = GradCamExplainer::new(
//!     model, labels, "layer4.-1.conv3", preprocess, explain, device,
//! )?;
//! let explanation = explainer.explain(&ExplainRequest::new(
//!     "uploads/photo.jpg", "photo.jpg", "gradcam_outputs",
//! ))?;
//! for url in explanation.urls() {
//!     println!("{url}");
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod activation;
mod attribution;
mod error;
mod explainer;
mod persist;
mod predict;
mod selection;

pub use activation::ObservationRecord;
pub use attribution::{grad_cam, AttributionMap, RelevanceMap};
pub use error::{CaptureKind, ExplainError, Result};
pub use explainer::{ClassHeatmap, ExplainRequest, Explanation, GradCamExplainer};
pub use persist::{
    clear_directory, file_safe_label, heatmap_file_name, remove_older_than, write_heatmap, HeatmapRef,
};
pub use predict::{ClassProbability, Prediction};
pub use selection::select_target_classes;
