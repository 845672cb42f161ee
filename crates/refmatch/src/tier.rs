//! Size-tier classification and per-tier acceptance thresholds.
//!
//! References are binned by pixel dimensions into ICON/MID/BOARD, and the
//! tier selects the acceptance gates for every similarity signal. Small
//! icons rarely carry enough texture for local-feature matching, so the
//! grayscale fallback stays a viable single-signal route at ICON; large
//! boards get strict caps because loose hash gates pass too many bad
//! candidates at that scale.

use serde::{Deserialize, Serialize};

/// Size class of a reference image.
///
/// Ordering is ICON < MID < BOARD, which is also the serialization order
/// used for per-tier report maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    /// Small components: icons, tokens, small cards.
    #[serde(rename = "ICON")]
    Icon,
    /// Medium components: standard cards, mid-size elements.
    #[serde(rename = "MID")]
    Mid,
    /// Large components: board sections, oversized cards.
    #[serde(rename = "BOARD")]
    Board,
}

/// Acceptance gates for one tier. Distances are lower-is-better, the two
/// similarities higher-is-better.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierThresholds {
    /// Maximum admissible perceptual-hash Hamming distance.
    pub phash_max: u32,
    /// Maximum admissible difference-hash Hamming distance.
    pub dhash_max: u32,
    /// Minimum admissible local-feature similarity.
    pub feature_min: f64,
    /// Minimum admissible fallback-thumbnail similarity.
    pub fallback_min: f64,
}

const ICON_THRESHOLDS: TierThresholds = TierThresholds {
    phash_max: 16,
    dhash_max: 16,
    feature_min: 0.08,
    fallback_min: 0.82,
};

const MID_THRESHOLDS: TierThresholds = TierThresholds {
    phash_max: 12,
    dhash_max: 12,
    feature_min: 0.12,
    fallback_min: 0.85,
};

const BOARD_THRESHOLDS: TierThresholds = TierThresholds {
    phash_max: 10,
    dhash_max: 10,
    feature_min: 0.15,
    fallback_min: 0.88,
};

impl Tier {
    /// All tiers in ascending size order.
    pub const ALL: [Tier; 3] = [Tier::Icon, Tier::Mid, Tier::Board];

    /// Classify by pixel dimensions. Rules are checked in order: BOARD
    /// first, then ICON, then MID as the remainder.
    pub fn classify(width: u32, height: u32) -> Tier {
        let area = width as u64 * height as u64;
        let min_dim = width.min(height);
        if area >= 250_000 || min_dim >= 600 {
            return Tier::Board;
        }
        if min_dim < 140 || area < 25_000 {
            return Tier::Icon;
        }
        Tier::Mid
    }

    /// Acceptance thresholds for this tier.
    pub fn thresholds(self) -> TierThresholds {
        match self {
            Tier::Icon => ICON_THRESHOLDS,
            Tier::Mid => MID_THRESHOLDS,
            Tier::Board => BOARD_THRESHOLDS,
        }
    }

    /// Upper-case tier label as used in reports.
    pub fn name(self) -> &'static str {
        match self {
            Tier::Icon => "ICON",
            Tier::Mid => "MID",
            Tier::Board => "BOARD",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
