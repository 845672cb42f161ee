//! Perceptual and difference hashes.
//!
//! Both hashes are 64-bit signatures compared by Hamming distance. The
//! perceptual hash thresholds low-frequency DCT coefficients against their
//! median, making it robust to rescaling and mild recompression; the
//! difference hash encodes horizontal gradient signs and catches layout
//! changes the DCT smooths over.

use image::{imageops, GrayImage};

/// Side length of the DCT input for the perceptual hash.
const PHASH_SAMPLE: usize = 32;

/// Side length of the retained low-frequency block.
const PHASH_BLOCK: usize = 8;

/// A 64-bit image hash compared by Hamming distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HashSig(pub u64);

impl HashSig {
    /// Hamming distance to another hash, in [0, 64].
    pub fn distance(self, other: HashSig) -> u32 {
        (self.0 ^ other.0).count_ones()
    }
}

impl std::fmt::Display for HashSig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Separable 2-D DCT-II over a square f64 raster.
fn dct2(input: &[f64], size: usize) -> Vec<f64> {
    debug_assert_eq!(input.len(), size * size);
    let mut rows = vec![0.0f64; size * size];
    for y in 0..size {
        for u in 0..size {
            let mut sum = 0.0;
            for x in 0..size {
                let angle = std::f64::consts::PI / size as f64 * (x as f64 + 0.5) * u as f64;
                sum += input[y * size + x] * angle.cos();
            }
            rows[y * size + u] = sum;
        }
    }
    let mut output = vec![0.0f64; size * size];
    for x in 0..size {
        for v in 0..size {
            let mut sum = 0.0;
            for y in 0..size {
                let angle = std::f64::consts::PI / size as f64 * (y as f64 + 0.5) * v as f64;
                sum += rows[y * size + x] * angle.cos();
            }
            output[v * size + x] = sum;
        }
    }
    output
}

/// Perceptual hash: 32×32 grayscale → 2-D DCT → top-left 8×8 block,
/// one bit per coefficient set iff it exceeds the median of the block's
/// 63 non-DC coefficients.
pub fn phash(gray: &GrayImage) -> HashSig {
    let small = imageops::resize(
        gray,
        PHASH_SAMPLE as u32,
        PHASH_SAMPLE as u32,
        imageops::FilterType::Triangle,
    );
    let pixels: Vec<f64> = small.pixels().map(|p| p.0[0] as f64 / 255.0).collect();
    let spectrum = dct2(&pixels, PHASH_SAMPLE);

    let mut block = [0.0f64; PHASH_BLOCK * PHASH_BLOCK];
    for by in 0..PHASH_BLOCK {
        for bx in 0..PHASH_BLOCK {
            block[by * PHASH_BLOCK + bx] = spectrum[by * PHASH_SAMPLE + bx];
        }
    }

    // Median over the 63 AC coefficients; the DC term at (0,0) would
    // otherwise dominate and wash out the comparison.
    let mut ac: Vec<f64> = block[1..].to_vec();
    ac.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let median = ac[ac.len() / 2];

    let mut bits = 0u64;
    for (idx, &coeff) in block.iter().enumerate() {
        if coeff > median {
            bits |= 1u64 << idx;
        }
    }
    HashSig(bits)
}

/// Difference hash: 9×8 grayscale, one bit per pixel set iff its right
/// neighbor is brighter.
pub fn dhash(gray: &GrayImage) -> HashSig {
    let small = imageops::resize(gray, 9, 8, imageops::FilterType::Triangle);
    let mut bits = 0u64;
    let mut idx = 0;
    for y in 0..8 {
        for x in 0..8 {
            let left = small.get_pixel(x, y).0[0];
            let right = small.get_pixel(x + 1, y).0[0];
            if right > left {
                bits |= 1u64 << idx;
            }
            idx += 1;
        }
    }
    HashSig(bits)
}
