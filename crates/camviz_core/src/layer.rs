//! Layer path resolution.
//!
//! Layers are addressed by dot-separated paths such as `layer4.2.conv3`.
//! A negative numeric segment counts from the end of its siblings, so
//! `layer4.-1.conv3` names the last conv3 of the last block in `layer4`
//! whatever the network depth.

use crate::error::{CoreError, Result};

/// Resolve a layer path against the canonical layer names of a network.
///
/// Resolution proceeds segment by segment. At each level the candidate
/// segments are those of the names sharing the already resolved prefix.
/// A segment `-k` picks the k-th last numeric candidate; any other segment
/// must match a candidate exactly.
///
/// # Errors
///
/// Returns [`CoreError::LayerNotFound`] when any segment cannot be resolved
/// or the resolved path is not itself a tappable layer.
pub fn resolve_layer_path(layer_path: &str, names: &[String]) -> Result<String> {
    let not_found = || CoreError::LayerNotFound {
        layer: layer_path.to_string(),
        available: names.len(),
    };

    let layer_path = layer_path.trim();
    if layer_path.is_empty() {
        return Err(not_found());
    }

    let split: Vec<Vec<&str>> = names.iter().map(|n| n.split('.').collect()).collect();
    let mut resolved: Vec<String> = Vec::new();

    for (depth, segment) in layer_path.split('.').enumerate() {
        // Distinct child segments under the resolved prefix, in network order.
        let mut candidates: Vec<&str> = Vec::new();
        for parts in &split {
            if parts.len() <= depth {
                continue;
            }
            if parts[..depth].iter().zip(&resolved).all(|(a, b)| *a == b.as_str())
                && !candidates.contains(&parts[depth])
            {
                candidates.push(parts[depth]);
            }
        }

        let chosen = match segment.parse::<i64>() {
            Ok(offset) if offset < 0 => {
                let mut indices: Vec<usize> = candidates
                    .iter()
                    .filter_map(|c| c.parse::<usize>().ok())
                    .collect();
                indices.sort_unstable();
                let back = offset.unsigned_abs() as usize;
                if back > indices.len() {
                    return Err(not_found());
                }
                indices[indices.len() - back].to_string()
            }
            _ => {
                if !candidates.contains(&segment) {
                    return Err(not_found());
                }
                segment.to_string()
            }
        };
        resolved.push(chosen);
    }

    let canonical = resolved.join(".");
    if names.iter().any(|n| *n == canonical) {
        Ok(canonical)
    } else {
        Err(not_found())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> Vec<String> {
        [
            "conv1",
            "layer1.0.conv1",
            "layer1.0.conv2",
            "layer1.0.conv3",
            "layer1.0",
            "layer2.0.conv1",
            "layer2.0.conv3",
            "layer2.0",
            "layer2.1.conv1",
            "layer2.1.conv3",
            "layer2.1",
            "layer2.10.conv3",
            "layer2.10",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    #[test]
    fn test_exact_path() {
        assert_eq!(
            resolve_layer_path("layer2.1.conv3", &names()).unwrap(),
            "layer2.1.conv3"
        );
        assert_eq!(resolve_layer_path("conv1", &names()).unwrap(), "conv1");
    }

    #[test]
    fn test_negative_index_uses_numeric_order() {
        // 10 sorts after 1 numerically, not lexically.
        assert_eq!(
            resolve_layer_path("layer2.-1.conv3", &names()).unwrap(),
            "layer2.10.conv3"
        );
        assert_eq!(
            resolve_layer_path("layer2.-3.conv1", &names()).unwrap(),
            "layer2.0.conv1"
        );
    }

    #[test]
    fn test_block_output_path() {
        assert_eq!(resolve_layer_path("layer1.-1", &names()).unwrap(), "layer1.0");
    }

    #[test]
    fn test_missing_layer() {
        let err = resolve_layer_path("layer4.-1.conv3", &names()).unwrap_err();
        match err {
            CoreError::LayerNotFound { layer, available } => {
                assert_eq!(layer, "layer4.-1.conv3");
                assert_eq!(available, names().len());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_out_of_range_negative_index() {
        assert!(resolve_layer_path("layer1.-2.conv1", &names()).is_err());
    }

    #[test]
    fn test_partial_path_is_not_a_layer() {
        // `layer2` is a prefix of many layers but not a tappable layer itself.
        assert!(resolve_layer_path("layer2", &names()).is_err());
        assert!(resolve_layer_path("", &names()).is_err());
    }
}
