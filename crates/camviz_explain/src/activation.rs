//! Activation and gradient capture for one observed layer.

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use camviz_core::LayerProbe;

use crate::error::{CaptureKind, ExplainError, Result};

/// Captures the output of one layer during a forward pass and the gradient
/// of a score with respect to it after the backward pass.
///
/// On a tap of the observed layer the activation is detached from whatever
/// produced it and marked as a gradient leaf, so the backward pass stops at
/// the layer and only the leaf receives a gradient.
#[derive(Debug)]
pub struct ObservationRecord<B: AutodiffBackend> {
    layer: String,
    activation: Option<Tensor<B, 4>>,
    gradient: Option<Tensor<B::InnerBackend, 4>>,
}

impl<B: AutodiffBackend> ObservationRecord<B> {
    /// Create a record observing `layer` (a canonical layer name).
    pub fn new(layer: impl Into<String>) -> Self {
        Self {
            layer: layer.into(),
            activation: None,
            gradient: None,
        }
    }

    /// The observed layer.
    pub fn layer(&self) -> &str {
        &self.layer
    }

    /// Whether an activation has been captured since the last reset.
    pub fn has_activation(&self) -> bool {
        self.activation.is_some()
    }

    /// Whether a gradient has been captured since the last reset.
    pub fn has_gradient(&self) -> bool {
        self.gradient.is_some()
    }

    /// Clear both captures.
    pub fn reset(&mut self) {
        self.activation = None;
        self.gradient = None;
    }

    /// Read the gradient of the captured activation from a backward pass.
    pub fn capture_gradient(&mut self, grads: &B::Gradients) -> Result<()> {
        let activation = self
            .activation
            .as_ref()
            .ok_or(ExplainError::EmptyCapture(CaptureKind::Activation))?;
        let gradient = activation
            .grad(grads)
            .ok_or(ExplainError::EmptyCapture(CaptureKind::Gradient))?;
        self.gradient = Some(gradient);
        Ok(())
    }

    /// Take the (activation, gradient) pair, leaving the record empty.
    ///
    /// Both tensors have shape (batch, channels, height, width).
    pub fn take(&mut self) -> Result<(Tensor<B::InnerBackend, 4>, Tensor<B::InnerBackend, 4>)> {
        let activation = self
            .activation
            .take()
            .ok_or(ExplainError::EmptyCapture(CaptureKind::Activation))?;
        let gradient = self
            .gradient
            .take()
            .ok_or(ExplainError::EmptyCapture(CaptureKind::Gradient))?;
        Ok((activation.inner(), gradient))
    }
}

impl<B: AutodiffBackend> LayerProbe<B> for ObservationRecord<B> {
    fn tap(&mut self, layer: &str, activation: Tensor<B, 4>) -> Tensor<B, 4> {
        if layer != self.layer {
            return activation;
        }
        let leaf = activation.detach().require_grad();
        self.activation = Some(leaf.clone());
        // A new activation invalidates any gradient of the previous one.
        self.gradient = None;
        leaf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camviz_core::backend::CpuAutodiff;

    type TestBackend = CpuAutodiff;

    #[test]
    fn test_ignores_other_layers() {
        let device = Default::default();
        let mut record = ObservationRecord::<TestBackend>::new("layer1.0.conv3");
        let x = Tensor::<TestBackend, 4>::ones([1, 2, 2, 2], &device);

        let _ = record.tap("layer1.0.conv2", x);
        assert!(!record.has_activation());
        assert_eq!(record.layer(), "layer1.0.conv3");
    }

    #[test]
    fn test_captures_gradient_of_observed_layer() {
        let device = Default::default();
        let mut record = ObservationRecord::<TestBackend>::new("conv");
        let x = Tensor::<TestBackend, 1>::from_floats([1.0, 2.0, 3.0, 4.0], &device)
            .reshape([1, 1, 2, 2]);

        let act = record.tap("conv", x);
        // score = sum(3 * act), so d(score)/d(act) = 3 everywhere.
        let score = (act * 3.0).sum();
        let grads = score.backward();
        record.capture_gradient(&grads).unwrap();

        let (activation, gradient) = record.take().unwrap();
        let acts: Vec<f32> = activation.into_data().convert::<f32>().to_vec().unwrap();
        let grad: Vec<f32> = gradient.into_data().convert::<f32>().to_vec().unwrap();
        assert_eq!(acts, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(grad, vec![3.0; 4]);
        assert!(!record.has_activation());
    }

    #[test]
    fn test_empty_captures() {
        let mut record = ObservationRecord::<TestBackend>::new("conv");
        assert!(matches!(
            record.take(),
            Err(ExplainError::EmptyCapture(CaptureKind::Activation))
        ));

        let device = Default::default();
        let _ = record.tap("conv", Tensor::<TestBackend, 4>::ones([1, 1, 1, 1], &device));
        assert!(matches!(
            record.take(),
            Err(ExplainError::EmptyCapture(CaptureKind::Gradient))
        ));
    }

    #[test]
    fn test_reset_clears_captures() {
        let device = Default::default();
        let mut record = ObservationRecord::<TestBackend>::new("conv");
        let act = record.tap("conv", Tensor::<TestBackend, 4>::ones([1, 1, 2, 2], &device));
        let grads = act.sum().backward();
        record.capture_gradient(&grads).unwrap();
        assert!(record.has_gradient());

        record.reset();
        assert!(!record.has_activation());
        assert!(!record.has_gradient());
    }
}
