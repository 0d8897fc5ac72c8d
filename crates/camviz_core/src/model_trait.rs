//! Classifier and layer probe traits.
//!
//! Defines what a network must expose for its internal activations to be
//! observed during an explanation pass.

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;

use crate::error::Result;
use crate::layer::resolve_layer_path;

/// Observer handed to a classifier's forward pass.
///
/// The classifier calls [`LayerProbe::tap`] with the output of every
/// tappable layer and continues the forward pass with the tensor the probe
/// returns. A probe that is not interested in a layer returns the tensor
/// unchanged.
pub trait LayerProbe<B: Backend> {
    /// Observe the output of `layer`.
    ///
    /// # Arguments
    ///
    /// * `layer` - Canonical layer name, as listed by
    ///   [`ObservableClassifier::layer_names`]
    /// * `activation` - Layer output of shape (batch, channels, height, width)
    fn tap(&mut self, layer: &str, activation: Tensor<B, 4>) -> Tensor<B, 4>;
}

/// Probe that observes nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl<B: Backend> LayerProbe<B> for PassThrough {
    fn tap(&mut self, _layer: &str, activation: Tensor<B, 4>) -> Tensor<B, 4> {
        activation
    }
}

/// Trait for image classifiers whose internal layers can be observed.
///
/// Scores returned by the forward pass are per-class values in [0, 1].
pub trait ObservableClassifier<B: AutodiffBackend>: Module<B> + Clone + Send {
    /// Number of output classes.
    fn n_classes(&self) -> usize;

    /// Canonical names of every tappable layer, in forward order.
    fn layer_names(&self) -> Vec<String>;

    /// Forward pass reporting tappable layer outputs to `probe`.
    ///
    /// # Arguments
    ///
    /// * `x` - Input tensor of shape (batch, 3, height, width)
    /// * `probe` - Observer called at every tappable layer
    ///
    /// # Returns
    ///
    /// Scores tensor of shape (batch, n_classes)
    fn forward_observed(&self, x: Tensor<B, 4>, probe: &mut dyn LayerProbe<B>) -> Tensor<B, 2>;

    /// Forward pass without observation.
    fn forward_scores(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        self.forward_observed(x, &mut PassThrough)
    }

    /// Stop every activation in the network from overwriting its input.
    ///
    /// Must be idempotent; called once before any observation.
    fn disable_inplace_activations(&mut self);

    /// Resolve a layer path (negative indices allowed) to a canonical name.
    fn resolve_layer(&self, layer_path: &str) -> Result<String> {
        resolve_layer_path(layer_path, &self.layer_names())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::NdArray;

    #[test]
    fn test_pass_through_returns_input() {
        let device = Default::default();
        let x = Tensor::<NdArray, 4>::ones([1, 2, 3, 3], &device);
        let mut probe = PassThrough;
        let y = LayerProbe::<NdArray>::tap(&mut probe, "layer1.0.conv1", x.clone());
        assert_eq!(y.dims(), [1, 2, 3, 3]);
        let diff: f32 = (y - x).abs().sum().into_scalar().elem();
        assert_eq!(diff, 0.0);
    }
}
