//! Grad-CAM explainer.
//!
//! One request classifies an image, selects every class scoring above the
//! threshold and, for each, runs an observed forward pass, backpropagates
//! the class score to the target layer and renders the resulting relevance
//! map over the original image. Requests are serialized on the classifier
//! so no two explanation passes ever interleave.

use std::collections::HashMap;
use std::fs;
use std::marker::PhantomData;
use std::path::PathBuf;
use std::time::Instant;

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use camviz_core::{ExplainConfig, ObservableClassifier, PreprocessConfig};
use camviz_transforms::{HeatmapOverlay, ImagePreprocessor};
use image::RgbImage;
use parking_lot::Mutex;

use crate::activation::ObservationRecord;
use crate::attribution::{grad_cam, RelevanceMap};
use crate::error::{ExplainError, Result};
use crate::persist::{file_safe_label, heatmap_file_name, write_heatmap, HeatmapRef};
use crate::predict::Prediction;
use crate::selection::select_target_classes;

/// One image to explain.
#[derive(Debug, Clone, PartialEq)]
pub struct ExplainRequest {
    /// Image file to read.
    pub image_path: PathBuf,
    /// Name the heatmap file names are derived from.
    pub identifying_name: String,
    /// Directory heatmaps are written to; created if missing.
    pub output_dir: PathBuf,
    /// Overrides the configured threshold.
    pub threshold: Option<f32>,
}

impl ExplainRequest {
    /// Create a request using the configured threshold.
    pub fn new(
        image_path: impl Into<PathBuf>,
        identifying_name: impl Into<String>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            image_path: image_path.into(),
            identifying_name: identifying_name.into(),
            output_dir: output_dir.into(),
            threshold: None,
        }
    }

    /// Override the selection threshold.
    #[must_use]
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = Some(threshold);
        self
    }
}

/// Outcome of explaining one selected class.
#[derive(Debug)]
pub struct ClassHeatmap {
    /// Class index.
    pub class_index: usize,
    /// Class label.
    pub label: String,
    /// Class score from the initial classification.
    pub score: f32,
    /// The written heatmap, or why this class failed.
    pub outcome: Result<HeatmapRef>,
}

/// Result of one explanation request.
#[derive(Debug)]
pub struct Explanation {
    /// Classification of the image.
    pub prediction: Prediction,
    /// Classes scoring above the threshold, ascending.
    pub selected: Vec<usize>,
    /// One entry per selected class, in the same order.
    pub heatmaps: Vec<ClassHeatmap>,
}

impl Explanation {
    /// Raw class scores.
    pub fn scores(&self) -> &[f32] {
        &self.prediction.scores
    }

    /// References of the heatmaps that were written, in class order.
    pub fn urls(&self) -> Vec<&str> {
        self.heatmaps
            .iter()
            .filter_map(|h| h.outcome.as_ref().ok())
            .map(|r| r.url.as_str())
            .collect()
    }

    /// Selected classes whose heatmap could not be produced.
    pub fn failures(&self) -> Vec<&ClassHeatmap> {
        self.heatmaps.iter().filter(|h| h.outcome.is_err()).collect()
    }
}

/// Produces Grad-CAM heatmaps for a classifier.
///
/// The classifier is frozen and its activations are switched out of
/// in-place mode when the explainer is built. It is owned behind a lock
/// held for a whole request.
pub struct GradCamExplainer<B: AutodiffBackend, M: ObservableClassifier<B>> {
    classifier: Mutex<M>,
    labels: Vec<String>,
    layer: String,
    preprocessor: ImagePreprocessor,
    overlay: HeatmapOverlay,
    config: ExplainConfig,
    device: B::Device,
    _backend: PhantomData<B>,
}

impl<B: AutodiffBackend, M: ObservableClassifier<B>> GradCamExplainer<B, M> {
    /// Build an explainer.
    ///
    /// # Errors
    ///
    /// Configuration errors: label count differing from the classifier's
    /// outputs, an unresolvable target layer, invalid preprocessing or
    /// explanation settings.
    pub fn new(
        classifier: M,
        labels: Vec<String>,
        target_layer: &str,
        preprocess: PreprocessConfig,
        config: ExplainConfig,
        device: B::Device,
    ) -> Result<Self> {
        config.validate()?;
        if labels.len() != classifier.n_classes() {
            return Err(ExplainError::ClassCountMismatch {
                labels: labels.len(),
                classes: classifier.n_classes(),
            });
        }
        let mut file_labels = HashMap::with_capacity(labels.len());
        for label in &labels {
            if let Some(previous) = file_labels.insert(file_safe_label(label), label) {
                return Err(ExplainError::InvalidConfig(format!(
                    "labels '{}' and '{}' would share heatmap file names",
                    previous, label
                )));
            }
        }
        let layer = classifier.resolve_layer(target_layer)?;
        let preprocessor = ImagePreprocessor::new(preprocess)?;

        let mut classifier = classifier.no_grad();
        classifier.disable_inplace_activations();

        tracing::info!(
            target_layer = %layer,
            classes = labels.len(),
            "Grad-CAM explainer ready"
        );

        Ok(Self {
            classifier: Mutex::new(classifier),
            labels,
            layer,
            preprocessor,
            overlay: HeatmapOverlay::from_config(&config),
            config,
            device,
            _backend: PhantomData,
        })
    }

    /// Class labels in output order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Canonical name of the observed layer.
    pub fn target_layer(&self) -> &str {
        &self.layer
    }

    /// Explanation settings.
    pub fn config(&self) -> &ExplainConfig {
        &self.config
    }

    /// Every tappable layer of the classifier.
    pub fn layer_names(&self) -> Vec<String> {
        self.classifier.lock().layer_names()
    }

    /// Classify an image file.
    pub fn classify(&self, image_path: impl Into<PathBuf>) -> Result<Prediction> {
        let image_path = image_path.into();
        let start = Instant::now();
        let (_, x) = self.preprocessor.load::<B>(&image_path, &self.device)?;

        let classifier = self.classifier.lock();
        let scores = self.scores(&classifier, x)?;
        let prediction = Prediction::from_scores(&scores, &self.labels, start.elapsed())?;

        tracing::info!(
            image = %image_path.display(),
            label = %prediction.label,
            confidence = prediction.confidence,
            "Classified"
        );
        Ok(prediction)
    }

    /// Classify an image and write a heatmap for every class above the
    /// threshold.
    ///
    /// # Errors
    ///
    /// Input and output directory errors fail the whole request before any
    /// heatmap is written. Failures of individual classes are reported in
    /// [`Explanation::heatmaps`] instead.
    pub fn explain(&self, request: &ExplainRequest) -> Result<Explanation> {
        let threshold = request.threshold.unwrap_or(self.config.threshold);
        if !threshold.is_finite() {
            return Err(ExplainError::InvalidConfig(format!(
                "threshold must be finite, got {}",
                threshold
            )));
        }

        let classifier = self.classifier.lock();
        tracing::info!(image = %request.image_path.display(), threshold, "Explanation started");

        let start = Instant::now();
        let (image, x) = self.preprocessor.load::<B>(&request.image_path, &self.device)?;
        let scores = self.scores(&classifier, x.clone())?;
        let prediction = Prediction::from_scores(&scores, &self.labels, start.elapsed())?;

        fs::create_dir_all(&request.output_dir)?;

        let selected = select_target_classes(&scores, threshold);
        let mut heatmaps = Vec::with_capacity(selected.len());
        for &class_index in &selected {
            let label = &self.labels[class_index];
            tracing::debug!(class_index, label = %label, "Explaining class");

            let outcome = self
                .explain_pass(&classifier, x.clone(), class_index)
                .and_then(|map| {
                    self.overlay
                        .render(&image, map.values())
                        .map_err(ExplainError::from)
                })
                .and_then(|heatmap| {
                    let file = heatmap_file_name(&request.identifying_name, label, self.config.format);
                    write_heatmap(
                        &heatmap,
                        &request.output_dir,
                        &file,
                        self.config.format,
                        &self.config.url_prefix,
                    )
                });
            if let Err(e) = &outcome {
                tracing::warn!(class_index, label = %label, error = %e, "Heatmap failed");
            }

            heatmaps.push(ClassHeatmap {
                class_index,
                label: label.clone(),
                score: scores[class_index],
                outcome,
            });
        }

        let explanation = Explanation {
            prediction,
            selected,
            heatmaps,
        };
        tracing::info!(
            image = %request.image_path.display(),
            written = explanation.urls().len(),
            failed = explanation.failures().len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Explanation finished"
        );
        Ok(explanation)
    }

    /// Normalized relevance map of one class for an already decoded image.
    pub fn explain_class(&self, image: &RgbImage, class_index: usize) -> Result<RelevanceMap> {
        if class_index >= self.labels.len() {
            return Err(ExplainError::ClassOutOfRange {
                class_index,
                n_classes: self.labels.len(),
            });
        }
        let classifier = self.classifier.lock();
        let x = self.preprocessor.to_tensor::<B>(image, &self.device);
        self.explain_pass(&classifier, x, class_index)
    }

    fn scores(&self, classifier: &M, x: Tensor<B, 4>) -> Result<Vec<f32>> {
        let scores = classifier.forward_scores(x);
        let [_, n_classes] = scores.dims();
        if n_classes != self.labels.len() {
            return Err(ExplainError::ClassCountMismatch {
                labels: self.labels.len(),
                classes: n_classes,
            });
        }
        scores
            .into_data()
            .convert::<f32>()
            .to_vec()
            .map_err(|e| ExplainError::Other(format!("cannot read scores: {:?}", e)))
    }

    fn explain_pass(&self, classifier: &M, x: Tensor<B, 4>, class_index: usize) -> Result<RelevanceMap> {
        let mut record = ObservationRecord::<B>::new(self.layer.as_str());
        record.reset();

        let scores = classifier.forward_observed(x, &mut record);
        let [batch, n_classes] = scores.dims();
        if class_index >= n_classes {
            return Err(ExplainError::ClassOutOfRange {
                class_index,
                n_classes,
            });
        }

        let mut mask = vec![0.0f32; batch * n_classes];
        for row in 0..batch {
            mask[row * n_classes + class_index] = 1.0;
        }
        let one_hot = Tensor::<B, 2>::from_data(
            TensorData::new(mask, [batch, n_classes]).convert::<B::FloatElem>(),
            &self.device,
        );

        let grads = (scores * one_hot).sum().backward();
        record.capture_gradient(&grads)?;
        let (activations, gradients) = record.take()?;

        grad_cam(activations, gradients)?
            .with_target_class(class_index)
            .into_relevance_maps()?
            .into_iter()
            .next()
            .map(RelevanceMap::normalized)
            .ok_or_else(|| ExplainError::ShapeMismatch("empty batch".to_string()))
    }
}
