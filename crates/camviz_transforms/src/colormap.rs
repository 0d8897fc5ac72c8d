//! Colormaps and heatmap compositing.
//!
//! Relevance values in [0, 1] are quantized to 256 levels, mapped through a
//! lookup table and blended with the original image.

use camviz_core::{ColormapKind, CoreError, ExplainConfig, Result};
use image::{Rgb, RgbImage};
use ndarray::Array2;

use crate::resize::upsample_bilinear;

/// A 256-entry RGB lookup table.
#[derive(Debug, Clone)]
pub struct Colormap {
    kind: ColormapKind,
    table: [[u8; 3]; 256],
}

fn unit_to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn jet(x: f32) -> [u8; 3] {
    let channel = |centre: f32| unit_to_u8(1.5 - (4.0 * x - centre).abs());
    [channel(3.0), channel(2.0), channel(1.0)]
}

fn hot(x: f32) -> [u8; 3] {
    [
        unit_to_u8(3.0 * x),
        unit_to_u8(3.0 * x - 1.0),
        unit_to_u8(3.0 * x - 2.0),
    ]
}

impl Colormap {
    /// Build the lookup table for a colormap.
    #[must_use]
    pub fn new(kind: ColormapKind) -> Self {
        let mut table = [[0u8; 3]; 256];
        for (i, entry) in table.iter_mut().enumerate() {
            let x = i as f32 / 255.0;
            *entry = match kind {
                ColormapKind::Jet => jet(x),
                ColormapKind::Hot => hot(x),
            };
        }
        Self { kind, table }
    }

    /// Which colormap this is.
    #[must_use]
    pub fn kind(&self) -> ColormapKind {
        self.kind
    }

    /// Color of a relevance value.
    ///
    /// The value is quantized as `trunc(255 * v)`; out-of-range input is
    /// clamped and NaN maps to the zero color.
    #[must_use]
    pub fn lookup(&self, value: f32) -> [u8; 3] {
        let index = (value.clamp(0.0, 1.0) * 255.0) as u8;
        self.table[index as usize]
    }

    /// Colorize a 2-D map into an RGB image of the same size.
    #[must_use]
    pub fn colorize(&self, map: &Array2<f32>) -> RgbImage {
        let (height, width) = map.dim();
        RgbImage::from_fn(width as u32, height as u32, |x, y| {
            Rgb(self.lookup(map[[y as usize, x as usize]]))
        })
    }
}

impl From<ColormapKind> for Colormap {
    fn from(kind: ColormapKind) -> Self {
        Self::new(kind)
    }
}

/// Weighted per-channel blend of two equally sized images.
///
/// Each output channel is `round(image_weight * a + heatmap_weight * b)`
/// saturated to the u8 range.
pub fn blend(
    original: &RgbImage,
    heatmap: &RgbImage,
    image_weight: f32,
    heatmap_weight: f32,
) -> Result<RgbImage> {
    if original.dimensions() != heatmap.dimensions() {
        return Err(CoreError::ShapeMismatch(format!(
            "cannot blend {:?} image with {:?} heatmap",
            original.dimensions(),
            heatmap.dimensions()
        )));
    }

    let mut out = RgbImage::new(original.width(), original.height());
    for ((dst, src), heat) in out.pixels_mut().zip(original.pixels()).zip(heatmap.pixels()) {
        for c in 0..3 {
            let v = image_weight * f32::from(src[c]) + heatmap_weight * f32::from(heat[c]);
            dst[c] = v.round().clamp(0.0, 255.0) as u8;
        }
    }
    Ok(out)
}

/// Renders relevance maps as colored overlays on the original image.
#[derive(Debug, Clone)]
pub struct HeatmapOverlay {
    colormap: Colormap,
    image_weight: f32,
    heatmap_weight: f32,
}

impl HeatmapOverlay {
    /// Create an overlay renderer.
    #[must_use]
    pub fn new(colormap: ColormapKind, image_weight: f32, heatmap_weight: f32) -> Self {
        Self {
            colormap: Colormap::new(colormap),
            image_weight,
            heatmap_weight,
        }
    }

    /// Create from the explanation config.
    #[must_use]
    pub fn from_config(config: &ExplainConfig) -> Self {
        Self::new(config.colormap, config.image_weight, config.heatmap_weight)
    }

    /// The colormap in use.
    #[must_use]
    pub fn colormap(&self) -> &Colormap {
        &self.colormap
    }

    /// Resize a relevance map to the original's resolution, colorize it and
    /// blend it with the original. The original is not modified.
    pub fn render(&self, original: &RgbImage, relevance: &Array2<f32>) -> Result<RgbImage> {
        let (width, height) = original.dimensions();
        let resized = upsample_bilinear(relevance, width as usize, height as usize);
        let colored = self.colormap.colorize(&resized);
        blend(original, &colored, self.image_weight, self.heatmap_weight)
    }
}
