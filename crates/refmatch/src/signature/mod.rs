//! Per-image similarity signatures.
//!
//! Every reference and candidate gets the same four signatures, computed
//! once from the decoded raster:
//!
//! - [`hash::phash`] – DCT low-frequency perceptual hash (64 bits)
//! - [`hash::dhash`] – horizontal-gradient difference hash (64 bits)
//! - [`features`] – binary local-feature descriptor set
//! - [`fallback`] – 64×64 grayscale thumbnail for low-texture images
//!
//! Signature computation is deterministic in the image bytes: identical
//! bytes always produce identical signatures, independent of path, load
//! order, or thread count.

pub mod fallback;
pub mod features;
pub mod hash;

use image::DynamicImage;

pub use fallback::ThumbSig;
pub use features::FeatureSet;
pub use hash::HashSig;

/// All signatures of one image.
#[derive(Debug, Clone)]
pub struct Signatures {
    /// Perceptual (DCT) hash.
    pub phash: HashSig,
    /// Difference hash.
    pub dhash: HashSig,
    /// Local-feature descriptor set.
    pub features: FeatureSet,
    /// Grayscale fallback thumbnail.
    pub thumb: ThumbSig,
}

/// Compute all four signatures from a decoded image.
pub fn extract(image: &DynamicImage) -> Signatures {
    let gray = image.to_luma8();
    Signatures {
        phash: hash::phash(&gray),
        dhash: hash::dhash(&gray),
        features: features::extract(&gray),
        thumb: fallback::extract(&gray),
    }
}
