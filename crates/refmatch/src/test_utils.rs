//! Shared synthetic-image painters for unit tests.

use image::{GrayImage, Luma};

/// Deterministic xorshift64 step.
pub(crate) fn xorshift64(state: &mut u64) -> u64 {
    let mut x = *state;
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    *state = x;
    x
}

/// Blocky random texture: `cell`-sized squares of seeded random gray.
///
/// The block edges give corner detectors something to bite on while the
/// seed keeps every image byte-reproducible.
pub(crate) fn block_noise(width: u32, height: u32, cell: u32, seed: u64) -> GrayImage {
    let cols = width.div_ceil(cell);
    let rows = height.div_ceil(cell);
    let mut state = seed.wrapping_mul(0x2545_f491_4f6c_dd1d) | 1;
    let mut values = Vec::with_capacity((cols * rows) as usize);
    for _ in 0..cols * rows {
        values.push((xorshift64(&mut state) % 256) as u8);
    }
    GrayImage::from_fn(width, height, |x, y| {
        let idx = (y / cell) * cols + (x / cell);
        Luma([values[idx as usize]])
    })
}

/// Smooth left-to-right / top-to-bottom luminance ramp.
pub(crate) fn gradient(width: u32, height: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        let v = (x as u32 * 128 / width.max(1)) + (y as u32 * 128 / height.max(1));
        Luma([v.min(255) as u8])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_noise_is_seed_deterministic() {
        assert_eq!(block_noise(32, 32, 8, 4), block_noise(32, 32, 8, 4));
        assert_ne!(block_noise(32, 32, 8, 4), block_noise(32, 32, 8, 5));
    }

    #[test]
    fn gradient_covers_requested_dimensions() {
        let img = gradient(48, 24);
        assert_eq!(img.dimensions(), (48, 24));
    }
}
