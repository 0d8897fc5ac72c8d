//! Classifier weight persistence.
//!
//! Weights are stored with Burn's named MessagePack recorder (`*.mpk`),
//! either at full precision or at half precision for smaller files.
//!
//! # Example
//!
//! ```rust,ignore
//! use camviz_models::checkpoint::{save_model, load_record, CheckpointFormat};
//! use camviz_models::ResNetConfig;
//!
//! let model = ResNetConfig::resnet50(6).init::<NdArray>(&device);
//! save_model(&model, "classifier.mpk", CheckpointFormat::Full)?;
//!
//! let record = load_record::<NdArray, ResNet<_>>("classifier.mpk", CheckpointFormat::Full, &device)?;
//! let model = model.load_record(record);
//! ```

use std::path::Path;

use burn::module::Module;
use burn::prelude::*;
use burn::record::{
    FullPrecisionSettings, HalfPrecisionSettings, NamedMpkFileRecorder, Recorder,
};
use camviz_core::CoreError;

/// Precision of a stored checkpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointFormat {
    /// Named MessagePack with f32 weights.
    #[default]
    Full,
    /// Named MessagePack with f16 weights.
    Compact,
}

/// Save a model to a checkpoint file.
///
/// The recorder appends the `.mpk` extension when the path has none.
pub fn save_model<B, M>(model: &M, path: impl AsRef<Path>, format: CheckpointFormat) -> Result<()>
where
    B: Backend,
    M: Module<B>,
{
    let path = path.as_ref().to_path_buf();
    let record = model.clone().into_record();

    match format {
        CheckpointFormat::Full => {
            let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
            Recorder::<B>::record(&recorder, record, path)
        }
        CheckpointFormat::Compact => {
            let recorder = NamedMpkFileRecorder::<HalfPrecisionSettings>::new();
            Recorder::<B>::record(&recorder, record, path)
        }
    }
    .map_err(|e| CheckpointError::Save(e.to_string()))
}

/// Load a model record from a checkpoint file.
pub fn load_record<B, M>(
    path: impl AsRef<Path>,
    format: CheckpointFormat,
    device: &B::Device,
) -> Result<M::Record>
where
    B: Backend,
    M: Module<B>,
{
    let path = path.as_ref();
    if !path.exists() && !path.with_extension("mpk").exists() {
        return Err(CheckpointError::Load(format!(
            "{} does not exist",
            path.display()
        )));
    }

    match format {
        CheckpointFormat::Full => {
            let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
            Recorder::<B>::load::<M::Record>(&recorder, path.to_path_buf(), device)
        }
        CheckpointFormat::Compact => {
            let recorder = NamedMpkFileRecorder::<HalfPrecisionSettings>::new();
            Recorder::<B>::load::<M::Record>(&recorder, path.to_path_buf(), device)
        }
    }
    .map_err(|e| CheckpointError::Load(e.to_string()))
}

/// Result type for checkpoint operations.
pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Checkpoint-related errors.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    /// Error saving checkpoint.
    #[error("Failed to save checkpoint: {0}")]
    Save(String),

    /// Error loading checkpoint.
    #[error("Failed to load checkpoint: {0}")]
    Load(String),

    /// Invalid format.
    #[error("Invalid checkpoint format: {0}")]
    InvalidFormat(String),

    /// The classifier configuration is unusable.
    #[error(transparent)]
    Config(#[from] CoreError),
}

impl CheckpointFormat {
    /// Parse a format name.
    pub fn parse(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "full" | "f32" => Ok(Self::Full),
            "compact" | "half" | "f16" => Ok(Self::Compact),
            other => Err(CheckpointError::InvalidFormat(other.to_string())),
        }
    }
}

/// Extension trait for models to add checkpoint methods.
pub trait ModelCheckpoint<B: Backend>: Module<B> {
    /// Save the model to a full precision checkpoint file.
    fn save_checkpoint(&self, path: impl AsRef<Path>) -> Result<()> {
        save_model::<B, Self>(self, path, CheckpointFormat::Full)
    }

    /// Load weights from a checkpoint into a copy of this model.
    fn load_checkpoint(
        &self,
        path: impl AsRef<Path>,
        format: CheckpointFormat,
        device: &B::Device,
    ) -> Result<Self>
    where
        Self: Sized,
    {
        let record = load_record::<B, Self>(path, format, device)?;
        Ok(self.clone().load_record(record))
    }
}

impl<B: Backend, M: Module<B>> ModelCheckpoint<B> for M {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resnet::{ResNet, ResNetConfig};
    use camviz_core::backend::NdArray;
    use camviz_core::PassThrough;

    type TestBackend = NdArray;

    fn tiny() -> ResNetConfig {
        ResNetConfig::new(2).with_layers(vec![1]).with_base_width(2)
    }

    #[test]
    fn test_checkpoint_format_parse() {
        assert_eq!(CheckpointFormat::parse("full").unwrap(), CheckpointFormat::Full);
        assert_eq!(CheckpointFormat::parse("F16").unwrap(), CheckpointFormat::Compact);
        assert!(matches!(
            CheckpointFormat::parse("onnx"),
            Err(CheckpointError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_save_and_reload_reproduces_scores() {
        let device = Default::default();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("classifier.mpk");

        let model: ResNet<TestBackend> = tiny().init(&device);
        model.save_checkpoint(&path).unwrap();

        let fresh: ResNet<TestBackend> = tiny().init(&device);
        let loaded = fresh
            .load_checkpoint(&path, CheckpointFormat::Full, &device)
            .unwrap();

        let x = Tensor::<TestBackend, 4>::ones([1, 3, 16, 16], &device);
        let a = model.forward_observed(x.clone(), &mut PassThrough);
        let b = loaded.forward_observed(x, &mut PassThrough);
        let diff: f32 = (a - b).abs().max().into_scalar().elem();
        assert!(diff < 1e-6);
    }

    #[test]
    fn test_load_missing_checkpoint() {
        let device = Default::default();
        let result = load_record::<TestBackend, ResNet<TestBackend>>(
            "/no/such/classifier.mpk",
            CheckpointFormat::Full,
            &device,
        );
        assert!(matches!(result, Err(CheckpointError::Load(_))));
    }
}
