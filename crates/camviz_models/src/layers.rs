//! Building blocks for inference-only convolutional networks.

use burn::module::Param;
use burn::prelude::*;
use burn::tensor::activation::relu;

/// ReLU activation with a switchable in-place mode.
///
/// In place, the input tensor is handed to the backend by value, which lets
/// it overwrite the input buffer when no other handle exists. Otherwise a
/// second handle is held for the duration of the op so the backend always
/// writes a fresh buffer and the input stays intact for any observer.
#[derive(Module, Clone, Debug)]
pub struct Activation {
    inplace: bool,
}

impl Activation {
    /// Create an activation.
    #[must_use]
    pub fn new(inplace: bool) -> Self {
        Self { inplace }
    }

    /// Whether the activation may overwrite its input.
    #[must_use]
    pub fn is_inplace(&self) -> bool {
        self.inplace
    }

    /// Switch the in-place mode.
    pub fn set_inplace(&mut self, inplace: bool) {
        self.inplace = inplace;
    }

    /// Forward pass.
    pub fn forward<B: Backend, const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        if self.inplace {
            return relu(x);
        }
        // The clone keeps a second live handle, so the backend cannot reuse
        // the input buffer for the output.
        let out = relu(x.clone());
        drop(x);
        out
    }
}

impl Default for Activation {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Configuration for [`FrozenBatchNorm`].
#[derive(Debug, Clone)]
pub struct FrozenBatchNormConfig {
    /// Number of channels.
    pub num_features: usize,
    /// Added to the variance before the square root.
    pub epsilon: f64,
}

impl FrozenBatchNormConfig {
    /// Create a config with the usual epsilon of 1e-5.
    #[must_use]
    pub fn new(num_features: usize) -> Self {
        Self {
            num_features,
            epsilon: 1e-5,
        }
    }

    /// Initialize an identity normalization (unit scale, zero shift).
    pub fn init<B: Backend>(&self, device: &B::Device) -> FrozenBatchNorm<B> {
        let c = self.num_features;
        FrozenBatchNorm {
            weight: Param::from_tensor(Tensor::ones([c], device)),
            bias: Param::from_tensor(Tensor::zeros([c], device)),
            running_mean: Param::from_tensor(Tensor::zeros([c], device)),
            running_var: Param::from_tensor(Tensor::ones([c], device)),
            epsilon: self.epsilon,
        }
    }
}

/// Batch normalization over (batch, channels, height, width) using stored
/// statistics only.
///
/// Unlike a trainable batch norm, the output never depends on the batch and
/// no running statistic is updated during the forward pass, so the network
/// stays bit-for-bit reproducible whether or not gradients are tracked.
#[derive(Module, Debug)]
pub struct FrozenBatchNorm<B: Backend> {
    /// Per-channel scale.
    pub weight: Param<Tensor<B, 1>>,
    /// Per-channel shift.
    pub bias: Param<Tensor<B, 1>>,
    /// Stored channel means.
    pub running_mean: Param<Tensor<B, 1>>,
    /// Stored channel variances.
    pub running_var: Param<Tensor<B, 1>>,
    epsilon: f64,
}

impl<B: Backend> FrozenBatchNorm<B> {
    /// Forward pass.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let [_, channels, _, _] = x.dims();
        let scale = self.weight.val() / (self.running_var.val() + self.epsilon).sqrt();
        let shift = self.bias.val() - self.running_mean.val() * scale.clone();
        x * scale.reshape([1, channels, 1, 1]) + shift.reshape([1, channels, 1, 1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camviz_core::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_activation_modes_agree() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 1>::from_floats([-2.0, -0.5, 0.0, 0.5, 2.0], &device)
            .reshape([1, 1, 1, 5]);

        let a = Activation::new(true).forward(x.clone());
        let b = Activation::new(false).forward(x);
        let a: Vec<f32> = a.into_data().convert::<f32>().to_vec().unwrap();
        let b: Vec<f32> = b.into_data().convert::<f32>().to_vec().unwrap();
        assert_eq!(a, vec![0.0, 0.0, 0.0, 0.5, 2.0]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_activation_preserves_shared_input() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 1>::from_floats([-1.0, 3.0], &device).reshape([1, 1, 1, 2]);
        let observed = x.clone();

        let _ = Activation::new(false).forward(x);
        let kept: Vec<f32> = observed.into_data().convert::<f32>().to_vec().unwrap();
        assert_eq!(kept, vec![-1.0, 3.0]);
    }

    #[test]
    fn test_frozen_batch_norm_identity_init() {
        let device = Default::default();
        let bn = FrozenBatchNormConfig::new(2).init::<TestBackend>(&device);
        let x = Tensor::<TestBackend, 4>::ones([1, 2, 3, 3], &device) * 4.0;

        let y = bn.forward(x.clone());
        let diff: f32 = (y - x).abs().max().into_scalar().elem();
        assert!(diff < 1e-3);
    }

    #[test]
    fn test_frozen_batch_norm_statistics() {
        let device = Default::default();
        let mut bn = FrozenBatchNormConfig {
            num_features: 1,
            epsilon: 0.0,
        }
        .init::<TestBackend>(&device);
        bn.running_mean = Param::from_tensor(Tensor::from_floats([2.0], &device));
        bn.running_var = Param::from_tensor(Tensor::from_floats([4.0], &device));
        bn.bias = Param::from_tensor(Tensor::from_floats([1.0], &device));

        let x = Tensor::<TestBackend, 4>::ones([1, 1, 1, 1], &device) * 6.0;
        let y: f32 = bn.forward(x).into_scalar().elem();
        // (6 - 2) / 2 + 1
        assert!((y - 3.0).abs() < 1e-6);
    }
}
