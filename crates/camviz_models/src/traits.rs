//! Classifier trait implementations.

use burn::tensor::backend::AutodiffBackend;
use burn::prelude::*;
use camviz_core::{LayerProbe, ObservableClassifier};

use crate::resnet::ResNet;

impl<B: AutodiffBackend> ObservableClassifier<B> for ResNet<B> {
    fn n_classes(&self) -> usize {
        ResNet::n_classes(self)
    }

    fn layer_names(&self) -> Vec<String> {
        ResNet::layer_names(self)
    }

    fn forward_observed(&self, x: Tensor<B, 4>, probe: &mut dyn LayerProbe<B>) -> Tensor<B, 2> {
        ResNet::forward_observed(self, x, probe)
    }

    fn disable_inplace_activations(&mut self) {
        self.disable_inplace();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resnet::ResNetConfig;
    use camviz_core::backend::CpuAutodiff;
    use camviz_core::CoreError;

    type TestBackend = CpuAutodiff;

    fn tiny() -> ResNet<TestBackend> {
        let device = Default::default();
        ResNetConfig::new(6)
            .with_layers(vec![1, 2])
            .with_base_width(2)
            .init(&device)
    }

    #[test]
    fn test_resolve_default_target_layer() {
        let model = tiny();
        assert_eq!(model.resolve_layer("layer2.-1.conv3").unwrap(), "layer2.1.conv3");
        assert_eq!(model.resolve_layer("layer2.-1").unwrap(), "layer2.1");
        assert_eq!(model.resolve_layer("conv1").unwrap(), "conv1");
    }

    #[test]
    fn test_resolve_unknown_layer() {
        let model = tiny();
        assert!(matches!(
            model.resolve_layer("layer4.-1.conv3"),
            Err(CoreError::LayerNotFound { .. })
        ));
        assert!(model.resolve_layer("layer2.5.conv1").is_err());
    }

    #[test]
    fn test_forward_scores_shape() {
        let model = tiny();
        let x = Tensor::<TestBackend, 4>::zeros([1, 3, 32, 32], &Default::default());
        let scores = ObservableClassifier::forward_scores(&model, x);
        assert_eq!(scores.dims(), [1, 6]);
    }

    #[test]
    fn test_disable_inplace_through_trait() {
        let mut model = tiny();
        ObservableClassifier::disable_inplace_activations(&mut model);
        ObservableClassifier::disable_inplace_activations(&mut model);
        assert_eq!(model.inplace_activations(), 0);
    }
}
