//! Target class selection.

/// Indices of the classes to explain, in ascending class order.
///
/// A class is selected when its score is strictly greater than `threshold`.
/// A NaN score is never selected.
pub fn select_target_classes(scores: &[f32], threshold: f32) -> Vec<usize> {
    scores
        .iter()
        .enumerate()
        .filter(|(_, score)| **score > threshold)
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCORES: [f32; 6] = [0.9, 0.3, 0.7, 0.1, 0.2, 0.05];

    #[test]
    fn test_selects_above_threshold_in_class_order() {
        assert_eq!(select_target_classes(&SCORES, 0.5), vec![0, 2]);
    }

    #[test]
    fn test_threshold_is_strict() {
        assert_eq!(select_target_classes(&SCORES, 0.7), vec![0]);
    }

    #[test]
    fn test_threshold_above_one_selects_nothing() {
        assert!(select_target_classes(&SCORES, 1.1).is_empty());
    }

    #[test]
    fn test_negative_threshold_selects_all() {
        assert_eq!(select_target_classes(&SCORES, -0.1).len(), 6);
    }

    #[test]
    fn test_nan_score_not_selected() {
        assert_eq!(select_target_classes(&[f32::NAN, 0.8], 0.5), vec![1]);
    }
}
