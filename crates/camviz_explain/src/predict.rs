//! Classification summaries.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ExplainError, Result};

/// Probability of one class, in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassProbability {
    /// Class index in classifier output order.
    pub class_index: usize,
    /// Class label.
    pub label: String,
    /// Score times 100.
    pub probability: f32,
}

/// Result of classifying one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Highest scoring class.
    pub class_index: usize,
    /// Label of the highest scoring class.
    pub label: String,
    /// Score of the highest scoring class, in percent.
    pub confidence: f32,
    /// Every class, highest probability first.
    pub probabilities: Vec<ClassProbability>,
    /// Raw scores in class order.
    pub scores: Vec<f32>,
    /// Wall time spent decoding, preprocessing and scoring.
    pub processing_time: Duration,
}

impl Prediction {
    /// Summarize a score vector.
    ///
    /// Ties go to the lowest class index, both for the top class and in the
    /// sorted probability list.
    pub fn from_scores(scores: &[f32], labels: &[String], processing_time: Duration) -> Result<Self> {
        if scores.len() != labels.len() {
            return Err(ExplainError::ClassCountMismatch {
                labels: labels.len(),
                classes: scores.len(),
            });
        }

        let mut probabilities: Vec<ClassProbability> = scores
            .iter()
            .zip(labels)
            .enumerate()
            .map(|(class_index, (score, label))| ClassProbability {
                class_index,
                label: label.clone(),
                probability: score * 100.0,
            })
            .collect();
        probabilities.sort_by(|a, b| b.probability.total_cmp(&a.probability));

        let top = probabilities
            .first()
            .ok_or_else(|| ExplainError::InvalidConfig("classifier has no outputs".to_string()))?;

        Ok(Self {
            class_index: top.class_index,
            label: top.label.clone(),
            confidence: top.probability,
            probabilities: probabilities.clone(),
            scores: scores.to_vec(),
            processing_time,
        })
    }

    /// Up to `n` classes whose probability exceeds `min_percent`, highest first.
    pub fn top(&self, n: usize, min_percent: f32) -> impl Iterator<Item = &ClassProbability> {
        self.probabilities
            .iter()
            .filter(move |p| p.probability > min_percent)
            .take(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> Vec<String> {
        ["hormigon", "ceramico", "piedra", "yeso", "asfaltico", "basura_general"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn test_from_scores() {
        let scores = [0.9, 0.3, 0.7, 0.1, 0.2, 0.05];
        let prediction =
            Prediction::from_scores(&scores, &labels(), Duration::from_millis(120)).unwrap();

        assert_eq!(prediction.class_index, 0);
        assert_eq!(prediction.label, "hormigon");
        assert!((prediction.confidence - 90.0).abs() < 1e-4);

        let order: Vec<usize> = prediction.probabilities.iter().map(|p| p.class_index).collect();
        assert_eq!(order, vec![0, 2, 1, 4, 3, 5]);
        assert_eq!(prediction.scores, scores.to_vec());
    }

    #[test]
    fn test_ties_prefer_lowest_index() {
        let scores = [0.4, 0.8, 0.8, 0.1, 0.0, 0.0];
        let prediction = Prediction::from_scores(&scores, &labels(), Duration::ZERO).unwrap();
        assert_eq!(prediction.class_index, 1);
        assert_eq!(prediction.probabilities[1].class_index, 2);
    }

    #[test]
    fn test_top_filters_by_percent() {
        let scores = [0.9, 0.6, 0.7, 0.55, 0.2, 0.05];
        let prediction = Prediction::from_scores(&scores, &labels(), Duration::ZERO).unwrap();
        let top: Vec<&str> = prediction.top(3, 50.0).map(|p| p.label.as_str()).collect();
        assert_eq!(top, vec!["hormigon", "piedra", "ceramico"]);
    }

    #[test]
    fn test_length_mismatch() {
        assert!(matches!(
            Prediction::from_scores(&[0.5], &labels(), Duration::ZERO),
            Err(ExplainError::ClassCountMismatch { .. })
        ));
    }

    #[test]
    fn test_serializes_to_json() {
        let prediction =
            Prediction::from_scores(&[0.2, 0.8], &labels()[..2], Duration::from_secs(1)).unwrap();
        let json = serde_json::to_value(&prediction).unwrap();
        assert_eq!(json["label"], "ceramico");
        assert_eq!(json["probabilities"][0]["class_index"], 1);
    }
}
