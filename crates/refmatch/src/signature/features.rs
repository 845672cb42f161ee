//! Binary local-feature extraction and matching.
//!
//! Detector: FAST-9 corners (imageproc), strongest 500, with an
//! intensity-centroid orientation per keypoint. Descriptor: 256
//! brightness-comparison bits over a fixed test-pair pattern rotated into
//! the keypoint orientation, giving rotation invariance. The pattern is
//! generated once from a hard-coded xorshift seed, so descriptor output
//! is a pure function of the image bytes.
//!
//! Set similarity is the Lowe ratio-test fraction of the smaller set,
//! scaled by a set-size completion factor; the two together collapse to
//! `matched / |larger set|`.

use std::sync::OnceLock;

use image::GrayImage;
use imageproc::corners::{corners_fast9, Corner};

/// FAST-9 brightness threshold.
const FAST_THRESHOLD: u8 = 20;

/// Keep at most this many corners, strongest first.
const MAX_CORNERS: usize = 500;

/// Half-width of the orientation / sampling patch.
const PATCH_RADIUS: i32 = 15;

/// Test-pair endpoints stay within this radius so any rotation keeps the
/// sample inside the patch.
const PATTERN_RADIUS: i64 = 12;

/// Number of descriptor bits.
const DESCRIPTOR_BITS: usize = 256;

/// Sets smaller than this cannot be matched reliably; similarity is 0.
const MIN_DESCRIPTORS: usize = 8;

/// Lowe ratio: nearest neighbor must beat this fraction of the second.
const LOWE_RATIO: f64 = 0.75;

/// A 256-bit binary descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor(pub [u64; 4]);

impl Descriptor {
    /// Hamming distance to another descriptor, in [0, 256].
    pub fn distance(&self, other: &Descriptor) -> u32 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum()
    }
}

/// Descriptor set of one image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureSet {
    /// Descriptors in detection order (strongest corner first).
    pub descriptors: Vec<Descriptor>,
}

impl FeatureSet {
    /// Number of descriptors.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
struct TestPair {
    p: (i64, i64),
    q: (i64, i64),
}

fn xorshift64(state: &mut u64) -> u64 {
    let mut x = *state;
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    *state = x;
    x
}

fn pattern_point(state: &mut u64) -> (i64, i64) {
    loop {
        let span = 2 * PATTERN_RADIUS + 1;
        let x = (xorshift64(state) % span as u64) as i64 - PATTERN_RADIUS;
        let y = (xorshift64(state) % span as u64) as i64 - PATTERN_RADIUS;
        if x * x + y * y <= PATTERN_RADIUS * PATTERN_RADIUS {
            return (x, y);
        }
    }
}

static TEST_PAIRS: OnceLock<Vec<TestPair>> = OnceLock::new();

/// The fixed comparison pattern. Seeded once; never changes between runs
/// or platforms.
fn test_pairs() -> &'static [TestPair] {
    TEST_PAIRS.get_or_init(|| {
        let mut state: u64 = 0x9e37_79b9_7f4a_7c15;
        let mut pairs = Vec::with_capacity(DESCRIPTOR_BITS);
        while pairs.len() < DESCRIPTOR_BITS {
            let p = pattern_point(&mut state);
            let q = pattern_point(&mut state);
            if p != q {
                pairs.push(TestPair { p, q });
            }
        }
        pairs
    })
}

fn in_bounds(corner: &Corner, width: u32, height: u32) -> bool {
    let r = PATCH_RADIUS as u32;
    corner.x >= r && corner.y >= r && corner.x + r < width && corner.y + r < height
}

/// Intensity-centroid orientation of the circular patch around (cx, cy).
fn orientation(gray: &GrayImage, cx: i32, cy: i32) -> f64 {
    let mut m01 = 0.0f64;
    let mut m10 = 0.0f64;
    for dy in -PATCH_RADIUS..=PATCH_RADIUS {
        for dx in -PATCH_RADIUS..=PATCH_RADIUS {
            if dx * dx + dy * dy > PATCH_RADIUS * PATCH_RADIUS {
                continue;
            }
            let v = gray.get_pixel((cx + dx) as u32, (cy + dy) as u32).0[0] as f64;
            m10 += dx as f64 * v;
            m01 += dy as f64 * v;
        }
    }
    m01.atan2(m10)
}

fn sample(gray: &GrayImage, cx: i32, cy: i32, point: (i64, i64), sin: f64, cos: f64) -> u8 {
    let (px, py) = (point.0 as f64, point.1 as f64);
    let rx = (cos * px - sin * py).round() as i32;
    let ry = (sin * px + cos * py).round() as i32;
    let x = (cx + rx).clamp(0, gray.width() as i32 - 1);
    let y = (cy + ry).clamp(0, gray.height() as i32 - 1);
    gray.get_pixel(x as u32, y as u32).0[0]
}

fn describe(gray: &GrayImage, corner: &Corner) -> Descriptor {
    let cx = corner.x as i32;
    let cy = corner.y as i32;
    let theta = orientation(gray, cx, cy);
    let (sin, cos) = theta.sin_cos();

    let mut words = [0u64; 4];
    for (idx, pair) in test_pairs().iter().enumerate() {
        let a = sample(gray, cx, cy, pair.p, sin, cos);
        let b = sample(gray, cx, cy, pair.q, sin, cos);
        if a < b {
            words[idx / 64] |= 1u64 << (idx % 64);
        }
    }
    Descriptor(words)
}

/// Detect corners and compute descriptors for one grayscale image.
///
/// Corners too close to the border for a full patch are dropped; the rest
/// are ranked by FAST score (ties broken by position) and capped at
/// [`MAX_CORNERS`].
pub fn extract(gray: &GrayImage) -> FeatureSet {
    let (width, height) = gray.dimensions();
    if width <= 2 * PATCH_RADIUS as u32 || height <= 2 * PATCH_RADIUS as u32 {
        return FeatureSet::default();
    }

    let mut corners: Vec<Corner> = corners_fast9(gray, FAST_THRESHOLD)
        .into_iter()
        .filter(|c| in_bounds(c, width, height))
        .collect();
    corners.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| (a.y, a.x).cmp(&(b.y, b.x)))
    });
    corners.truncate(MAX_CORNERS);

    FeatureSet {
        descriptors: corners.iter().map(|c| describe(gray, c)).collect(),
    }
}

/// Ratio-test similarity of two descriptor sets, in [0, 1].
///
/// Each descriptor of the smaller set is matched against the larger set;
/// a match counts when the nearest neighbor beats [`LOWE_RATIO`] of the
/// second nearest. The matched fraction of the smaller set is scaled by
/// the set-size completion factor `|smaller| / |larger|`.
pub fn similarity(a: &FeatureSet, b: &FeatureSet) -> f64 {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    if small.len() < MIN_DESCRIPTORS {
        return 0.0;
    }

    let mut matched = 0usize;
    for d in &small.descriptors {
        let mut best = u32::MAX;
        let mut second = u32::MAX;
        for e in &large.descriptors {
            let dist = d.distance(e);
            if dist < best {
                second = best;
                best = dist;
            } else if dist < second {
                second = dist;
            }
        }
        if (best as f64) < LOWE_RATIO * (second as f64) {
            matched += 1;
        }
    }

    (matched as f64 / large.len() as f64).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::block_noise;
    use image::Luma;

    #[test]
    fn pattern_is_stable_and_in_radius() {
        let pairs = test_pairs();
        assert_eq!(pairs.len(), DESCRIPTOR_BITS);
        for pair in pairs {
            assert!(pair.p.0 * pair.p.0 + pair.p.1 * pair.p.1 <= PATTERN_RADIUS * PATTERN_RADIUS);
            assert!(pair.q.0 * pair.q.0 + pair.q.1 * pair.q.1 <= PATTERN_RADIUS * PATTERN_RADIUS);
            assert_ne!(pair.p, pair.q);
        }
        // Same seed, same pattern: spot-check the first pair against a
        // second independent generation.
        let mut state: u64 = 0x9e37_79b9_7f4a_7c15;
        let p = pattern_point(&mut state);
        assert_eq!(pairs[0].p, p);
    }

    #[test]
    fn extraction_is_deterministic() {
        let img = block_noise(128, 128, 8, 42);
        assert_eq!(extract(&img), extract(&img));
    }

    #[test]
    fn flat_image_yields_no_descriptors() {
        let img = GrayImage::from_pixel(128, 128, Luma([128]));
        assert!(extract(&img).is_empty());
    }

    #[test]
    fn tiny_image_yields_no_descriptors() {
        let img = block_noise(20, 20, 4, 1);
        assert!(extract(&img).is_empty());
    }

    #[test]
    fn textured_image_yields_descriptors() {
        let set = extract(&block_noise(128, 128, 8, 9));
        assert!(set.len() >= MIN_DESCRIPTORS, "got {} descriptors", set.len());
        assert!(set.len() <= MAX_CORNERS);
    }

    #[test]
    fn self_similarity_is_high_and_cross_similarity_low() {
        let a = extract(&block_noise(128, 128, 8, 33));
        let b = extract(&block_noise(128, 128, 8, 34));
        let self_sim = similarity(&a, &a);
        let cross_sim = similarity(&a, &b);
        assert!(self_sim > 0.8, "self similarity {self_sim}");
        assert!(cross_sim < self_sim);
        assert!(cross_sim < 0.5, "cross similarity {cross_sim}");
    }

    #[test]
    fn similarity_is_zero_below_minimum_set_size() {
        let full = extract(&block_noise(128, 128, 8, 7));
        let sparse = FeatureSet {
            descriptors: full.descriptors.iter().copied().take(7).collect(),
        };
        assert_eq!(similarity(&sparse, &full), 0.0);
        assert_eq!(similarity(&full, &sparse), 0.0);
        assert_eq!(similarity(&FeatureSet::default(), &full), 0.0);
    }

    #[test]
    fn descriptor_distance_counts_bit_flips() {
        let zero = Descriptor([0; 4]);
        let ones = Descriptor([u64::MAX; 4]);
        assert_eq!(zero.distance(&zero), 0);
        assert_eq!(zero.distance(&ones), 256);
        let one_bit = Descriptor([1, 0, 0, 0]);
        assert_eq!(zero.distance(&one_bit), 1);
    }
}
