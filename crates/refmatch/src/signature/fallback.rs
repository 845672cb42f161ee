//! Grayscale fallback signature for low-texture images.
//!
//! Flat icons defeat corner detectors, so the last-resort signal is a
//! plain 64×64 normalized thumbnail compared by mean absolute difference.

use image::{imageops, GrayImage};

/// Thumbnail side length.
const THUMB_SIZE: u32 = 64;

/// Normalized 64×64 grayscale thumbnail.
#[derive(Debug, Clone, PartialEq)]
pub struct ThumbSig {
    /// Row-major pixels in [0, 1].
    pub pixels: Vec<f32>,
}

/// Build the fallback signature for one grayscale image.
pub fn extract(gray: &GrayImage) -> ThumbSig {
    let thumb = imageops::resize(gray, THUMB_SIZE, THUMB_SIZE, imageops::FilterType::Triangle);
    ThumbSig {
        pixels: thumb.pixels().map(|p| p.0[0] as f32 / 255.0).collect(),
    }
}

/// Similarity in [0, 1]: `1 − mean(|a − b|)`, higher is more similar.
pub fn similarity(a: &ThumbSig, b: &ThumbSig) -> f64 {
    debug_assert_eq!(a.pixels.len(), b.pixels.len());
    let n = a.pixels.len().min(b.pixels.len());
    if n == 0 {
        return 0.0;
    }
    let sum: f64 = a
        .pixels
        .iter()
        .zip(b.pixels.iter())
        .map(|(x, y)| (x - y).abs() as f64)
        .sum();
    1.0 - sum / n as f64
}
