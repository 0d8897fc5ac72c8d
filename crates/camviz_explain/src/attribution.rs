//! Gradient-weighted class activation maps.

use burn::prelude::*;
use ndarray::Array2;

use crate::error::{ExplainError, Result};

/// Raw Grad-CAM values for a batch.
#[derive(Debug, Clone)]
pub struct AttributionMap<B: Backend> {
    /// Relevance values of shape (batch, 1, height, width), non-negative.
    pub values: Tensor<B, 4>,
    /// Class the map explains.
    pub target_class: Option<usize>,
}

impl<B: Backend> AttributionMap<B> {
    /// Create a new attribution map.
    pub fn new(values: Tensor<B, 4>) -> Self {
        Self {
            values,
            target_class: None,
        }
    }

    /// Set the target class.
    #[must_use]
    pub fn with_target_class(mut self, class: usize) -> Self {
        self.target_class = Some(class);
        self
    }

    /// Get the shape of the attribution map.
    pub fn shape(&self) -> [usize; 4] {
        self.values.dims()
    }

    /// Split into one 2-D map per batch item.
    pub fn into_relevance_maps(self) -> Result<Vec<RelevanceMap>> {
        let [batch, _, height, width] = self.values.dims();
        let values: Vec<f32> = self
            .values
            .into_data()
            .convert::<f32>()
            .to_vec()
            .map_err(|e| ExplainError::Other(format!("cannot read relevance values: {:?}", e)))?;

        values
            .chunks(height * width)
            .take(batch)
            .map(|chunk| RelevanceMap::from_vec(height, width, chunk.to_vec()))
            .collect()
    }
}

/// Compute Grad-CAM relevance.
///
/// Channel weights are the spatial mean of the gradient; the map is the
/// weighted sum of activation channels with negative values set to zero.
///
/// # Arguments
///
/// * `activations` - Observed layer output (batch, channels, height, width)
/// * `gradients` - Gradient of the class score w.r.t. `activations`
///
/// # Returns
///
/// Attribution map of shape (batch, 1, height, width).
pub fn grad_cam<B: Backend>(
    activations: Tensor<B, 4>,
    gradients: Tensor<B, 4>,
) -> Result<AttributionMap<B>> {
    if activations.dims() != gradients.dims() {
        return Err(ExplainError::ShapeMismatch(format!(
            "activations {:?} vs gradients {:?}",
            activations.dims(),
            gradients.dims()
        )));
    }

    // (batch, channels, height, width) -> (batch, channels, 1, 1)
    let weights = gradients.mean_dim(3).mean_dim(2);

    // Sum across channels: -> (batch, 1, height, width)
    let cam = (activations * weights).sum_dim(1);

    Ok(AttributionMap::new(cam.clamp_min(0.0)))
}

/// A 2-D relevance map at the observed layer's spatial resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct RelevanceMap {
    values: Array2<f32>,
}

impl RelevanceMap {
    /// Wrap an array of shape (height, width).
    pub fn new(values: Array2<f32>) -> Self {
        Self { values }
    }

    /// Build from row-major values.
    pub fn from_vec(height: usize, width: usize, values: Vec<f32>) -> Result<Self> {
        let len = values.len();
        Array2::from_shape_vec((height, width), values)
            .map(Self::new)
            .map_err(|_| {
                ExplainError::ShapeMismatch(format!(
                    "{} values cannot form a {}x{} map",
                    len, height, width
                ))
            })
    }

    /// The values, shape (height, width).
    pub fn values(&self) -> &Array2<f32> {
        &self.values
    }

    /// (height, width).
    pub fn dim(&self) -> (usize, usize) {
        self.values.dim()
    }

    /// Largest value, 0 for an empty map.
    pub fn max(&self) -> f32 {
        self.values.iter().copied().fold(0.0, f32::max)
    }

    /// Scale so the maximum becomes 1.
    ///
    /// An all-zero map is returned unchanged.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        let max = self.max();
        if max > 0.0 {
            self.values.mapv_inplace(|v| v / max);
        }
        self
    }

    /// Unwrap the array.
    pub fn into_inner(self) -> Array2<f32> {
        self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camviz_core::backend::NdArray;

    type TestBackend = NdArray;

    fn tensor(values: &[f32], shape: [usize; 4]) -> Tensor<TestBackend, 4> {
        Tensor::<TestBackend, 1>::from_floats(values, &Default::default()).reshape(shape)
    }

    #[test]
    fn test_grad_cam_weights_channels_by_mean_gradient() {
        // Two channels of 1x2. Channel 0 gradient mean 1, channel 1 mean -0.5.
        let acts = tensor(&[1.0, 3.0, 2.0, 2.0], [1, 2, 1, 2]);
        let grads = tensor(&[0.5, 1.5, -0.5, -0.5], [1, 2, 1, 2]);

        let cam = grad_cam(acts, grads).unwrap();
        assert_eq!(cam.shape(), [1, 1, 1, 2]);
        let maps = cam.into_relevance_maps().unwrap();
        // 1*1 - 0.5*2 = 0, 1*3 - 0.5*2 = 2
        assert_eq!(maps[0].values().as_slice().unwrap(), &[0.0, 2.0]);
    }

    #[test]
    fn test_grad_cam_clamps_negative() {
        let acts = tensor(&[1.0, 2.0], [1, 1, 1, 2]);
        let grads = tensor(&[-1.0, -1.0], [1, 1, 1, 2]);
        let maps = grad_cam(acts, grads).unwrap().into_relevance_maps().unwrap();
        assert!(maps[0].values().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_grad_cam_shape_mismatch() {
        let acts = tensor(&[1.0, 2.0], [1, 1, 1, 2]);
        let grads = tensor(&[1.0, 2.0], [1, 2, 1, 1]);
        assert!(matches!(
            grad_cam(acts, grads),
            Err(ExplainError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_batch_split() {
        let acts = tensor(&[1.0, 1.0, 2.0, 2.0], [2, 1, 1, 2]);
        let grads = tensor(&[1.0, 1.0, 1.0, 1.0], [2, 1, 1, 2]);
        let maps = grad_cam(acts, grads)
            .unwrap()
            .with_target_class(3)
            .into_relevance_maps()
            .unwrap();
        assert_eq!(maps.len(), 2);
        assert_eq!(maps[1].max(), 2.0);
    }

    #[test]
    fn test_normalized_range() {
        let map = RelevanceMap::from_vec(2, 2, vec![0.0, 0.5, 2.0, 1.0]).unwrap().normalized();
        assert_eq!(map.max(), 1.0);
        assert_eq!(map.values()[[0, 1]], 0.25);
        assert!(map.values().iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_normalized_zero_map_unchanged() {
        let map = RelevanceMap::new(Array2::zeros((3, 3))).normalized();
        assert!(map.values().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_from_vec_wrong_length() {
        assert!(RelevanceMap::from_vec(2, 2, vec![1.0; 3]).is_err());
    }
}
