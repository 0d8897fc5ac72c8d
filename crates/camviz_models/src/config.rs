//! Classifier configuration document.

use std::path::{Path, PathBuf};

use burn::prelude::*;
use camviz_core::{read_json_config, CoreError, ExplainConfig, PreprocessConfig};
use serde::{Deserialize, Serialize};

use crate::checkpoint::{CheckpointFormat, ModelCheckpoint};
use crate::resnet::{ResNet, ResNetConfig};

/// Everything needed to build a classifier and explain its predictions.
///
/// Missing fields fall back to their defaults, so a document containing only
/// `{"checkpoint": "classifier.mpk"}` is valid. When `model.n_classes` is
/// absent the class count follows `labels`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Class labels in classifier output order.
    pub labels: Vec<String>,
    /// Layer to observe, negative indices allowed.
    pub target_layer: String,
    /// Weights to load. A randomly initialized network is used when absent.
    pub checkpoint: Option<PathBuf>,
    /// Precision of the checkpoint.
    pub checkpoint_format: CheckpointFormat,
    /// Network layout.
    pub model: ResNetConfig,
    /// Input transform.
    pub preprocess: PreprocessConfig,
    /// Class selection and compositing.
    pub explain: ExplainConfig,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        let labels: Vec<String> = [
            "hormigon",
            "ceramico",
            "piedra",
            "yeso",
            "asfaltico",
            "basura_general",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        Self {
            model: ResNetConfig::resnet50(labels.len()),
            labels,
            target_layer: "layer4.-1.conv3".to_string(),
            checkpoint: None,
            checkpoint_format: CheckpointFormat::Full,
            preprocess: PreprocessConfig::default(),
            explain: ExplainConfig::default(),
        }
    }
}

impl ClassifierConfig {
    /// Read and validate a JSON config file.
    ///
    /// A relative checkpoint path is resolved against the config's directory.
    pub fn load(path: impl AsRef<Path>) -> camviz_core::Result<Self> {
        let path = path.as_ref();
        let document: serde_json::Value = read_json_config(path)?;
        let explicit_classes = document.pointer("/model/n_classes").is_some();
        let mut config: Self = serde_json::from_value(document)
            .map_err(|e| CoreError::SerializationError(format!("{}: {}", path.display(), e)))?;
        if !explicit_classes {
            config.model.n_classes = config.labels.len();
        }
        if let (Some(checkpoint), Some(dir)) = (&config.checkpoint, path.parent()) {
            if checkpoint.is_relative() {
                config.checkpoint = Some(dir.join(checkpoint));
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Check every section and their consistency.
    pub fn validate(&self) -> camviz_core::Result<()> {
        if self.labels.is_empty() {
            return Err(CoreError::InvalidConfig(
                "labels must not be empty".to_string(),
            ));
        }
        if self.labels.len() != self.model.n_classes {
            return Err(CoreError::ClassCountMismatch {
                labels: self.labels.len(),
                classes: self.model.n_classes,
            });
        }
        if self.target_layer.trim().is_empty() {
            return Err(CoreError::InvalidConfig(
                "target_layer must not be empty".to_string(),
            ));
        }
        self.model.validate()?;
        self.preprocess.validate()?;
        self.explain.validate()
    }

    /// Build the classifier, loading the checkpoint when one is configured.
    pub fn load_classifier<B: Backend>(
        &self,
        device: &B::Device,
    ) -> crate::checkpoint::Result<ResNet<B>> {
        self.validate()?;
        let model = self.model.init::<B>(device);

        match &self.checkpoint {
            Some(path) => {
                let model = model.load_checkpoint(path, self.checkpoint_format, device)?;
                tracing::info!(
                    checkpoint = %path.display(),
                    classes = self.labels.len(),
                    "Classifier weights loaded"
                );
                Ok(model)
            }
            None => {
                tracing::warn!(
                    "No checkpoint configured, using randomly initialized weights; predictions are meaningless"
                );
                Ok(model)
            }
        }
    }
}
