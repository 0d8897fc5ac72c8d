//! Relevance map resizing.

use ndarray::Array2;

/// Source sample positions and weights for one output axis.
///
/// Uses half-pixel centres (`src = (dst + 0.5) * scale - 0.5`) clamped to
/// the source edges, the same sampling grid as common image libraries.
fn axis_taps(src_len: usize, dst_len: usize) -> Vec<(usize, usize, f32)> {
    let scale = src_len as f32 / dst_len as f32;
    (0..dst_len)
        .map(|dst| {
            let pos = ((dst as f32 + 0.5) * scale - 0.5).max(0.0);
            let lo = (pos.floor() as usize).min(src_len - 1);
            let hi = (lo + 1).min(src_len - 1);
            let t = if hi == lo { 0.0 } else { pos - lo as f32 };
            (lo, hi, t)
        })
        .collect()
}

/// Upsample (or downsample) a 2-D map with bilinear interpolation.
///
/// Every output value is a convex combination of at most four source values,
/// so the result never exceeds the source range and no new maximum appears
/// away from the source peaks.
///
/// # Arguments
///
/// * `map` - Source map of shape (rows, cols)
/// * `width` - Output width in pixels
/// * `height` - Output height in pixels
///
/// # Returns
///
/// Array of shape (height, width). An empty source yields zeros.
pub fn upsample_bilinear(map: &Array2<f32>, width: usize, height: usize) -> Array2<f32> {
    let (src_h, src_w) = map.dim();
    if src_h == 0 || src_w == 0 || width == 0 || height == 0 {
        return Array2::zeros((height, width));
    }

    let rows = axis_taps(src_h, height);
    let cols = axis_taps(src_w, width);

    Array2::from_shape_fn((height, width), |(y, x)| {
        let (y0, y1, ty) = rows[y];
        let (x0, x1, tx) = cols[x];
        let top = map[[y0, x0]] * (1.0 - tx) + map[[y0, x1]] * tx;
        let bottom = map[[y1, x0]] * (1.0 - tx) + map[[y1, x1]] * tx;
        top * (1.0 - ty) + bottom * ty
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argmax(map: &Array2<f32>) -> (usize, usize) {
        let mut best = ((0, 0), f32::MIN);
        for ((y, x), &v) in map.indexed_iter() {
            if v > best.1 {
                best = ((y, x), v);
            }
        }
        best.0
    }

    #[test]
    fn test_output_shape() {
        let map = Array2::<f32>::zeros((7, 7));
        let out = upsample_bilinear(&map, 800, 600);
        assert_eq!(out.dim(), (600, 800));
    }

    #[test]
    fn test_constant_map_stays_constant() {
        let map = Array2::<f32>::from_elem((3, 5), 0.25);
        let out = upsample_bilinear(&map, 41, 17);
        assert!(out.iter().all(|v| (v - 0.25).abs() < 1e-6));
    }

    #[test]
    fn test_identity_size() {
        let map = Array2::from_shape_fn((4, 4), |(y, x)| (y * 4 + x) as f32);
        let out = upsample_bilinear(&map, 4, 4);
        for (a, b) in map.iter().zip(out.iter()) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_peak_location_preserved() {
        // Single peak in a 7x7 grid upsampled to 800x600.
        let mut map = Array2::<f32>::zeros((7, 7));
        map[[2, 5]] = 1.0;
        map[[2, 4]] = 0.5;
        map[[4, 1]] = 0.3;

        let out = upsample_bilinear(&map, 800, 600);
        let (y, x) = argmax(&out);
        assert_eq!(y * 7 / 600, 2);
        assert_eq!(x * 7 / 800, 5);

        let max = out.iter().cloned().fold(f32::MIN, f32::max);
        let min = out.iter().cloned().fold(f32::MAX, f32::min);
        assert!(max <= 1.0);
        assert!(min >= 0.0);
    }

    #[test]
    fn test_monotonic_away_from_peak() {
        let mut map = Array2::<f32>::zeros((7, 7));
        map[[3, 3]] = 1.0;
        let out = upsample_bilinear(&map, 700, 700);

        // Along the centre row, values do not increase moving right of the peak.
        let row = out.row(350);
        for x in 351..699 {
            assert!(row[x + 1] <= row[x] + 1e-6);
        }
    }

    #[test]
    fn test_empty_source() {
        let map = Array2::<f32>::zeros((0, 0));
        let out = upsample_bilinear(&map, 3, 2);
        assert_eq!(out.dim(), (2, 3));
    }
}
