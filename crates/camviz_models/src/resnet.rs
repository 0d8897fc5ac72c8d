//! Bottleneck ResNet for image classification.

use burn::module::Ignored;
use burn::nn::{
    conv::{Conv2d, Conv2dConfig},
    pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
    Linear, LinearConfig, PaddingConfig2d,
};
use burn::prelude::*;
use burn::tensor::activation::{sigmoid, softmax};
use camviz_core::{CoreError, LayerProbe, Result};
use serde::{Deserialize, Serialize};

use crate::layers::{Activation, FrozenBatchNorm, FrozenBatchNormConfig};

/// How logits are turned into per-class scores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreActivation {
    /// Independent per-class probabilities (multi-label).
    #[default]
    Sigmoid,
    /// Probabilities summing to one across classes.
    Softmax,
}

/// Configuration for the ResNet model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResNetConfig {
    /// Number of input channels.
    pub in_channels: usize,
    /// Number of output classes.
    pub n_classes: usize,
    /// Number of bottleneck blocks in each stage.
    pub layers: Vec<usize>,
    /// Width of the stem and of the first stage's bottleneck.
    pub base_width: usize,
    /// Channel expansion of the last convolution in each bottleneck.
    pub expansion: usize,
    /// Score head.
    pub score_activation: ScoreActivation,
}

impl Default for ResNetConfig {
    fn default() -> Self {
        Self {
            in_channels: 3,
            n_classes: 6,
            layers: vec![3, 4, 6, 3],
            base_width: 64,
            expansion: 4,
            score_activation: ScoreActivation::Sigmoid,
        }
    }
}

impl ResNetConfig {
    /// Create a config with default layout for `n_classes` outputs.
    pub fn new(n_classes: usize) -> Self {
        Self {
            n_classes,
            ..Default::default()
        }
    }

    /// ResNet-50 layout: stages of 3, 4, 6 and 3 bottlenecks, width 64.
    pub fn resnet50(n_classes: usize) -> Self {
        Self::new(n_classes).with_layers(vec![3, 4, 6, 3]).with_base_width(64)
    }

    /// Set the stage depths.
    #[must_use]
    pub fn with_layers(mut self, layers: Vec<usize>) -> Self {
        self.layers = layers;
        self
    }

    /// Set the base width.
    #[must_use]
    pub fn with_base_width(mut self, base_width: usize) -> Self {
        self.base_width = base_width;
        self
    }

    /// Set the score head.
    #[must_use]
    pub fn with_score_activation(mut self, score_activation: ScoreActivation) -> Self {
        self.score_activation = score_activation;
        self
    }

    /// Number of channels leaving the last stage.
    pub fn out_channels(&self) -> usize {
        let stages = self.layers.len().max(1) as u32;
        self.base_width * 2usize.pow(stages - 1) * self.expansion
    }

    /// Check the layout.
    pub fn validate(&self) -> Result<()> {
        if self.layers.is_empty() || self.layers.contains(&0) {
            return Err(CoreError::InvalidConfig(format!(
                "model.layers must list at least one stage with at least one block, got {:?}",
                self.layers
            )));
        }
        for (name, value) in [
            ("in_channels", self.in_channels),
            ("n_classes", self.n_classes),
            ("base_width", self.base_width),
            ("expansion", self.expansion),
        ] {
            if value == 0 {
                return Err(CoreError::InvalidConfig(format!(
                    "model.{} must be greater than zero",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Initialize the model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> ResNet<B> {
        ResNet::new(self.clone(), device)
    }
}

/// 1x1 strided projection on the residual path.
#[derive(Module, Debug)]
pub struct Downsample<B: Backend> {
    conv: Conv2d<B>,
    bn: FrozenBatchNorm<B>,
}

impl<B: Backend> Downsample<B> {
    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.bn.forward(self.conv.forward(x))
    }
}

/// Bottleneck residual block: 1x1 reduce, 3x3, 1x1 expand, plus shortcut.
#[derive(Module, Debug)]
pub struct Bottleneck<B: Backend> {
    conv1: Conv2d<B>,
    bn1: FrozenBatchNorm<B>,
    conv2: Conv2d<B>,
    bn2: FrozenBatchNorm<B>,
    conv3: Conv2d<B>,
    bn3: FrozenBatchNorm<B>,
    downsample: Option<Downsample<B>>,
    act: Activation,
}

impl<B: Backend> Bottleneck<B> {
    /// Create a new bottleneck block.
    pub fn new(
        in_channels: usize,
        planes: usize,
        expansion: usize,
        stride: usize,
        device: &B::Device,
    ) -> Self {
        let out_channels = planes * expansion;

        let conv1 = Conv2dConfig::new([in_channels, planes], [1, 1])
            .with_bias(false)
            .init(device);
        let conv2 = Conv2dConfig::new([planes, planes], [3, 3])
            .with_stride([stride, stride])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .with_bias(false)
            .init(device);
        let conv3 = Conv2dConfig::new([planes, out_channels], [1, 1])
            .with_bias(false)
            .init(device);

        // Projection shortcut if shape changes
        let downsample = if stride != 1 || in_channels != out_channels {
            Some(Downsample {
                conv: Conv2dConfig::new([in_channels, out_channels], [1, 1])
                    .with_stride([stride, stride])
                    .with_bias(false)
                    .init(device),
                bn: FrozenBatchNormConfig::new(out_channels).init(device),
            })
        } else {
            None
        };

        Self {
            conv1,
            bn1: FrozenBatchNormConfig::new(planes).init(device),
            conv2,
            bn2: FrozenBatchNormConfig::new(planes).init(device),
            conv3,
            bn3: FrozenBatchNormConfig::new(out_channels).init(device),
            downsample,
            act: Activation::default(),
        }
    }

    /// Forward pass, reporting `{name}.conv1..3` and `{name}` to the probe.
    pub fn forward_observed(
        &self,
        x: Tensor<B, 4>,
        name: &str,
        probe: &mut dyn LayerProbe<B>,
    ) -> Tensor<B, 4> {
        let out = probe.tap(&format!("{name}.conv1"), self.conv1.forward(x.clone()));
        let out = self.act.forward(self.bn1.forward(out));

        let out = probe.tap(&format!("{name}.conv2"), self.conv2.forward(out));
        let out = self.act.forward(self.bn2.forward(out));

        let out = probe.tap(&format!("{name}.conv3"), self.conv3.forward(out));
        let out = self.bn3.forward(out);

        let shortcut = match &self.downsample {
            Some(downsample) => downsample.forward(x),
            None => x,
        };

        let out = self.act.forward(out + shortcut);
        probe.tap(name, out)
    }

    fn layer_names(name: &str) -> [String; 4] {
        [
            format!("{name}.conv1"),
            format!("{name}.conv2"),
            format!("{name}.conv3"),
            name.to_string(),
        ]
    }
}

/// Bottleneck ResNet classifier.
///
/// Stem (7x7/2 conv, max pool /2), stages `layer1..layerN` where every stage
/// after the first halves the spatial size, global average pooling and a
/// linear head followed by the configured score activation.
#[derive(Module, Debug)]
pub struct ResNet<B: Backend> {
    conv1: Conv2d<B>,
    bn1: FrozenBatchNorm<B>,
    act: Activation,
    maxpool: MaxPool2d,
    stages: Vec<Vec<Bottleneck<B>>>,
    avgpool: AdaptiveAvgPool2d,
    fc: Linear<B>,
    score_activation: Ignored<ScoreActivation>,
    n_classes: usize,
}

impl<B: Backend> ResNet<B> {
    /// Create a new ResNet model.
    pub fn new(config: ResNetConfig, device: &B::Device) -> Self {
        let conv1 = Conv2dConfig::new([config.in_channels, config.base_width], [7, 7])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Explicit(3, 3))
            .with_bias(false)
            .init(device);
        let maxpool = MaxPool2dConfig::new([3, 3])
            .with_strides([2, 2])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init();

        let mut stages = Vec::with_capacity(config.layers.len());
        let mut in_channels = config.base_width;
        for (stage_idx, &n_blocks) in config.layers.iter().enumerate() {
            let planes = config.base_width * 2usize.pow(stage_idx as u32);
            let stride = if stage_idx == 0 { 1 } else { 2 };

            let mut blocks = Vec::with_capacity(n_blocks);
            for block_idx in 0..n_blocks {
                let block_stride = if block_idx == 0 { stride } else { 1 };
                blocks.push(Bottleneck::new(
                    in_channels,
                    planes,
                    config.expansion,
                    block_stride,
                    device,
                ));
                in_channels = planes * config.expansion;
            }
            stages.push(blocks);
        }

        let avgpool = AdaptiveAvgPool2dConfig::new([1, 1]).init();
        let fc = LinearConfig::new(in_channels, config.n_classes).init(device);

        Self {
            conv1,
            bn1: FrozenBatchNormConfig::new(config.base_width).init(device),
            act: Activation::default(),
            maxpool,
            stages,
            avgpool,
            fc,
            score_activation: Ignored(config.score_activation),
            n_classes: config.n_classes,
        }
    }

    /// Number of output classes.
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Canonical names of every tappable layer, in forward order.
    pub fn layer_names(&self) -> Vec<String> {
        let mut names = vec!["conv1".to_string()];
        for (stage_idx, blocks) in self.stages.iter().enumerate() {
            for block_idx in 0..blocks.len() {
                let name = format!("layer{}.{}", stage_idx + 1, block_idx);
                names.extend(Bottleneck::<B>::layer_names(&name));
            }
        }
        names
    }

    /// Forward pass reporting every tappable layer to `probe`.
    ///
    /// # Returns
    ///
    /// Per-class scores of shape (batch, n_classes), each in [0, 1].
    pub fn forward_observed(&self, x: Tensor<B, 4>, probe: &mut dyn LayerProbe<B>) -> Tensor<B, 2> {
        let x = probe.tap("conv1", self.conv1.forward(x));
        let x = self.act.forward(self.bn1.forward(x));
        let mut x = self.maxpool.forward(x);

        for (stage_idx, blocks) in self.stages.iter().enumerate() {
            for (block_idx, block) in blocks.iter().enumerate() {
                let name = format!("layer{}.{}", stage_idx + 1, block_idx);
                x = block.forward_observed(x, &name, probe);
            }
        }

        let x = self.avgpool.forward(x);
        let [batch, channels, _, _] = x.dims();
        let logits = self.fc.forward(x.reshape([batch, channels]));

        match self.score_activation.0 {
            ScoreActivation::Sigmoid => sigmoid(logits),
            ScoreActivation::Softmax => softmax(logits, 1),
        }
    }

    /// Number of activations still allowed to overwrite their input.
    pub fn inplace_activations(&self) -> usize {
        let blocks = self
            .stages
            .iter()
            .flatten()
            .filter(|block| block.act.is_inplace())
            .count();
        blocks + usize::from(self.act.is_inplace())
    }

    /// Turn off in-place mode on every activation in the network.
    pub fn disable_inplace(&mut self) {
        self.act.set_inplace(false);
        for block in self.stages.iter_mut().flatten() {
            block.act.set_inplace(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camviz_core::backend::NdArray;
    use camviz_core::PassThrough;

    type TestBackend = NdArray;

    fn tiny_config() -> ResNetConfig {
        ResNetConfig::new(3).with_layers(vec![1, 1]).with_base_width(4)
    }

    struct Recorder(Vec<(String, [usize; 4])>);

    impl LayerProbe<TestBackend> for Recorder {
        fn tap(&mut self, layer: &str, activation: Tensor<TestBackend, 4>) -> Tensor<TestBackend, 4> {
            self.0.push((layer.to_string(), activation.dims()));
            activation
        }
    }

    #[test]
    fn test_resnet_config() {
        let config = ResNetConfig::default();
        assert_eq!(config.layers, vec![3, 4, 6, 3]);
        assert_eq!(config.n_classes, 6);
        assert_eq!(config.out_channels(), 2048);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_resnet_config_validation() {
        assert!(ResNetConfig::new(0).validate().is_err());
        assert!(ResNetConfig::new(2).with_layers(vec![]).validate().is_err());
        assert!(ResNetConfig::new(2).with_layers(vec![2, 0]).validate().is_err());
    }

    #[test]
    fn test_forward_scores_in_unit_interval() {
        let device = Default::default();
        let model = tiny_config().init::<TestBackend>(&device);
        let x = Tensor::<TestBackend, 4>::random(
            [2, 3, 32, 32],
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &device,
        );

        let scores = model.forward_observed(x, &mut PassThrough);
        assert_eq!(scores.dims(), [2, 3]);
        let values: Vec<f32> = scores.into_data().convert::<f32>().to_vec().unwrap();
        assert!(values.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_softmax_head_sums_to_one() {
        let device = Default::default();
        let model = tiny_config()
            .with_score_activation(ScoreActivation::Softmax)
            .init::<TestBackend>(&device);
        let x = Tensor::<TestBackend, 4>::ones([1, 3, 32, 32], &device);

        let total: f32 = model
            .forward_observed(x, &mut PassThrough)
            .sum()
            .into_scalar()
            .elem();
        assert!((total - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_layer_names_match_taps() {
        let device = Default::default();
        let model = tiny_config().init::<TestBackend>(&device);
        let x = Tensor::<TestBackend, 4>::zeros([1, 3, 32, 32], &device);

        let mut recorder = Recorder(Vec::new());
        let _ = model.forward_observed(x, &mut recorder);

        let tapped: Vec<String> = recorder.0.iter().map(|(n, _)| n.clone()).collect();
        assert_eq!(tapped, model.layer_names());
        assert_eq!(tapped.len(), 1 + 2 * 4);

        // Stem /4, second stage /2 again; conv3 expands to base_width * 2 * 4.
        let last_conv3 = recorder
            .0
            .iter()
            .find(|(n, _)| n == "layer2.0.conv3")
            .unwrap();
        assert_eq!(last_conv3.1, [1, 32, 4, 4]);
    }

    #[test]
    fn test_disable_inplace_is_idempotent() {
        let device = Default::default();
        let mut model = tiny_config().init::<TestBackend>(&device);
        assert_eq!(model.inplace_activations(), 3);

        model.disable_inplace();
        assert_eq!(model.inplace_activations(), 0);
        model.disable_inplace();
        assert_eq!(model.inplace_activations(), 0);
    }

    #[test]
    fn test_inplace_mode_does_not_change_scores() {
        let device = Default::default();
        let model = tiny_config().init::<TestBackend>(&device);
        let mut neutral = model.clone();
        neutral.disable_inplace();

        let x = Tensor::<TestBackend, 4>::random(
            [1, 3, 32, 32],
            burn::tensor::Distribution::Uniform(-1.0, 1.0),
            &device,
        );
        let a = model.forward_observed(x.clone(), &mut PassThrough);
        let b = neutral.forward_observed(x, &mut PassThrough);
        let diff: f32 = (a - b).abs().max().into_scalar().elem();
        assert_eq!(diff, 0.0);
    }
}
