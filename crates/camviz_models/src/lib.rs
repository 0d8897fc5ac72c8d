//! # camviz_models
//!
//! Reference image classifier for camviz explanations.
//!
//! ## Models
//! - [`ResNet`] - Bottleneck ResNet (ResNet-50 layout by default) with a
//!   per-class score head in [0, 1]
//!
//! ## Layers
//! - [`FrozenBatchNorm`] - Batch normalization with fixed statistics
//! - [`Activation`] - ReLU with a switchable in-place mode
//!
//! Every convolution and residual block is reported to a
//! [`LayerProbe`](camviz_core::LayerProbe) during the forward pass under a
//! torchvision-style name (`conv1`, `layer4.2.conv3`, `layer4.2`).

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod checkpoint;
pub mod config;
pub mod layers;
pub mod resnet;
pub mod traits;

pub use checkpoint::{
    load_record, save_model, CheckpointError, CheckpointFormat, ModelCheckpoint,
};
pub use config::ClassifierConfig;
pub use layers::{Activation, FrozenBatchNorm, FrozenBatchNormConfig};
pub use resnet::{Bottleneck, ResNet, ResNetConfig, ScoreActivation};
