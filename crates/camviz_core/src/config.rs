//! Preprocessing and explanation configuration.

use std::path::Path;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Allowed deviation of `image_weight + heatmap_weight` from 1.0.
pub const BLEND_TOLERANCE: f32 = 1e-6;

/// How an input image is turned into the classifier's input tensor.
///
/// The image is resized to `image_size x image_size`, scaled to [0, 1] and
/// normalized per channel with `(x - mean) / std`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Side length of the square network input.
    pub image_size: usize,
    /// Per-channel mean (RGB order).
    pub mean: [f32; 3],
    /// Per-channel standard deviation (RGB order).
    pub std: [f32; 3],
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            image_size: 224,
            mean: [0.485, 0.456, 0.406],
            std: [0.229, 0.224, 0.225],
        }
    }
}

impl PreprocessConfig {
    /// Create a config for a different input size with ImageNet statistics.
    #[must_use]
    pub fn with_image_size(mut self, image_size: usize) -> Self {
        self.image_size = image_size;
        self
    }

    /// Check that the config describes a usable transform.
    pub fn validate(&self) -> Result<()> {
        if self.image_size == 0 {
            return Err(CoreError::InvalidConfig(
                "preprocess.image_size must be greater than zero".to_string(),
            ));
        }
        if self.std.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(CoreError::InvalidConfig(format!(
                "preprocess.std must be positive, got {:?}",
                self.std
            )));
        }
        if self.mean.iter().any(|m| !m.is_finite()) {
            return Err(CoreError::InvalidConfig(format!(
                "preprocess.mean must be finite, got {:?}",
                self.mean
            )));
        }
        Ok(())
    }
}

/// Color scale used to render a relevance map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColormapKind {
    /// Blue to red through cyan and yellow.
    #[default]
    Jet,
    /// Black to white through red and yellow.
    Hot,
}

/// Encoding of persisted heatmap images.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeatmapFormat {
    /// JPEG, written with a `.jpg` extension.
    #[default]
    #[serde(rename = "jpg", alias = "jpeg")]
    Jpeg,
    /// PNG.
    #[serde(rename = "png")]
    Png,
    /// Windows bitmap.
    #[serde(rename = "bmp")]
    Bmp,
}

impl HeatmapFormat {
    /// File extension without the leading dot.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Bmp => "bmp",
        }
    }

    /// Parse a file extension (case-insensitive, with or without a dot).
    pub fn from_extension(ext: &str) -> Result<Self> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            "bmp" => Ok(Self::Bmp),
            other => Err(CoreError::InvalidConfig(format!(
                "unsupported heatmap format '{}', expected jpg, png or bmp",
                other
            ))),
        }
    }
}

/// Settings for target class selection and heatmap compositing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplainConfig {
    /// A class is explained when its score is strictly greater than this.
    pub threshold: f32,
    /// Opacity of the original image in the blend.
    pub image_weight: f32,
    /// Opacity of the colorized relevance map in the blend.
    pub heatmap_weight: f32,
    /// Color scale for the relevance map.
    pub colormap: ColormapKind,
    /// Encoding of written heatmaps.
    pub format: HeatmapFormat,
    /// Prefix prepended to file names to form the returned references.
    pub url_prefix: String,
}

impl Default for ExplainConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            image_weight: 0.6,
            heatmap_weight: 0.4,
            colormap: ColormapKind::Jet,
            format: HeatmapFormat::Jpeg,
            url_prefix: "/gradcam_outputs".to_string(),
        }
    }
}

impl ExplainConfig {
    /// Set the selection threshold.
    #[must_use]
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set the blend weights.
    #[must_use]
    pub fn with_weights(mut self, image_weight: f32, heatmap_weight: f32) -> Self {
        self.image_weight = image_weight;
        self.heatmap_weight = heatmap_weight;
        self
    }

    /// Set the output format.
    #[must_use]
    pub fn with_format(mut self, format: HeatmapFormat) -> Self {
        self.format = format;
        self
    }

    /// Check threshold and blend weights.
    ///
    /// The threshold only has to be finite: a value above every possible
    /// score simply selects no class.
    pub fn validate(&self) -> Result<()> {
        if !self.threshold.is_finite() {
            return Err(CoreError::InvalidConfig(format!(
                "explain.threshold must be finite, got {}",
                self.threshold
            )));
        }
        for (name, weight) in [
            ("image_weight", self.image_weight),
            ("heatmap_weight", self.heatmap_weight),
        ] {
            if !(0.0..=1.0).contains(&weight) {
                return Err(CoreError::InvalidConfig(format!(
                    "explain.{} must lie in [0, 1], got {}",
                    name, weight
                )));
            }
        }
        let total = self.image_weight + self.heatmap_weight;
        if (total - 1.0).abs() > BLEND_TOLERANCE {
            return Err(CoreError::InvalidConfig(format!(
                "blend weights must sum to 1.0, got {} + {} = {}",
                self.image_weight, self.heatmap_weight, total
            )));
        }
        Ok(())
    }
}

/// Read a JSON configuration document.
pub fn read_json_config<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path)?;
    serde_json::from_str(&json)
        .map_err(|e| CoreError::SerializationError(format!("{}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preprocess_defaults() {
        let config = PreprocessConfig::default();
        assert_eq!(config.image_size, 224);
        assert_eq!(config.mean, [0.485, 0.456, 0.406]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_preprocess_rejects_zero_std() {
        let config = PreprocessConfig {
            std: [0.2, 0.0, 0.2],
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(CoreError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_explain_defaults_are_valid() {
        let config = ExplainConfig::default();
        assert_eq!(config.threshold, 0.5);
        assert_eq!(config.image_weight, 0.6);
        assert_eq!(config.heatmap_weight, 0.4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_explain_threshold_above_one_is_valid() {
        let config = ExplainConfig::default().with_threshold(1.1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_explain_rejects_nan_threshold() {
        let config = ExplainConfig::default().with_threshold(f32::NAN);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_explain_rejects_weights_not_summing_to_one() {
        let config = ExplainConfig::default().with_weights(0.6, 0.6);
        assert!(config.validate().is_err());

        let config = ExplainConfig::default().with_weights(0.7, 0.3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_heatmap_format_extension() {
        assert_eq!(HeatmapFormat::Jpeg.extension(), "jpg");
        assert_eq!(HeatmapFormat::from_extension(".PNG").unwrap(), HeatmapFormat::Png);
        assert_eq!(HeatmapFormat::from_extension("jpeg").unwrap(), HeatmapFormat::Jpeg);
        assert!(HeatmapFormat::from_extension("gif").is_err());
    }

    #[test]
    fn test_explain_config_partial_json() {
        let config: ExplainConfig =
            serde_json::from_str(r#"{"threshold": 0.7, "colormap": "hot", "format": "png"}"#)
                .unwrap();
        assert_eq!(config.threshold, 0.7);
        assert_eq!(config.colormap, ColormapKind::Hot);
        assert_eq!(config.format, HeatmapFormat::Png);
        assert_eq!(config.url_prefix, "/gradcam_outputs");
    }

    #[test]
    fn test_read_json_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preprocess.json");
        std::fs::write(&path, r#"{"image_size": 64}"#).unwrap();

        let config: PreprocessConfig = read_json_config(&path).unwrap();
        assert_eq!(config.image_size, 64);
        assert_eq!(config.std, [0.229, 0.224, 0.225]);

        std::fs::write(&path, "not json").unwrap();
        let err = read_json_config::<PreprocessConfig>(&path).unwrap_err();
        assert!(matches!(err, CoreError::SerializationError(_)));
    }
}
