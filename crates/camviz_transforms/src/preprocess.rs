//! Image preprocessing for classifier input.
//!
//! Converts a decoded RGB raster into a `(1, 3, S, S)` tensor: square resize
//! with a triangle (bilinear) filter, scaling to [0, 1] and per-channel
//! mean/std normalization. The original raster is left untouched so heatmaps
//! can be composited at native resolution.

use std::path::Path;

use burn::prelude::*;
use camviz_core::{CoreError, PreprocessConfig, Result};
use image::imageops::{self, FilterType};
use image::RgbImage;

/// Turns images into normalized classifier input tensors.
#[derive(Debug, Clone)]
pub struct ImagePreprocessor {
    config: PreprocessConfig,
}

impl ImagePreprocessor {
    /// Create a preprocessor, validating the config.
    pub fn new(config: PreprocessConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// Load an image file as an RGB raster.
    ///
    /// # Errors
    ///
    /// [`CoreError::ImageNotFound`] if the path does not exist,
    /// [`CoreError::ImageDecode`] if it exists but cannot be decoded.
    pub fn load_rgb(&self, path: impl AsRef<Path>) -> Result<RgbImage> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(CoreError::ImageNotFound(path.to_path_buf()));
        }
        let image = image::open(path).map_err(|e| CoreError::ImageDecode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(image.to_rgb8())
    }

    /// Convert an RGB raster to a normalized input tensor.
    ///
    /// # Returns
    ///
    /// Tensor of shape (1, 3, image_size, image_size).
    pub fn to_tensor<B: Backend>(&self, image: &RgbImage, device: &B::Device) -> Tensor<B, 4> {
        let size = self.config.image_size;
        let resized = imageops::resize(image, size as u32, size as u32, FilterType::Triangle);

        let data: Vec<f32> = resized.into_raw().into_iter().map(f32::from).collect();
        let x = Tensor::<B, 3>::from_data(
            TensorData::new(data, [size, size, 3]).convert::<B::FloatElem>(),
            device,
        )
        // [H, W, C] -> [C, H, W]
        .permute([2, 0, 1])
            / 255.0;

        let mean = Tensor::<B, 1>::from_floats(self.config.mean, device).reshape([3, 1, 1]);
        let std = Tensor::<B, 1>::from_floats(self.config.std, device).reshape([3, 1, 1]);

        ((x - mean) / std).unsqueeze::<4>()
    }

    /// Load an image and build its input tensor in one step.
    ///
    /// Returns the original raster alongside the tensor.
    pub fn load<B: Backend>(
        &self,
        path: impl AsRef<Path>,
        device: &B::Device,
    ) -> Result<(RgbImage, Tensor<B, 4>)> {
        let image = self.load_rgb(path)?;
        let tensor = self.to_tensor(&image, device);
        Ok((image, tensor))
    }
}
