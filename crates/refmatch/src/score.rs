//! Pairwise scoring and tier admissibility.
//!
//! Every (reference, candidate) pair gets all four signal values plus a
//! combined lower-is-better score. The weighting puts hash agreement
//! slightly ahead of texture similarity; the ×20 factor brings feature
//! dissimilarity onto the same numeric scale as hash distances.

use serde::{Deserialize, Serialize};

use crate::signature::{fallback, features, Signatures};
use crate::tier::Tier;

/// Below this, local-feature similarity is considered noise and the
/// fallback thumbnail similarity substitutes in the combined score.
pub const FEATURE_CONFIDENCE_FLOOR: f64 = 0.05;

const HASH_WEIGHT: f64 = 0.55;
const FEATURE_WEIGHT: f64 = 0.45;
const FEATURE_SCALE: f64 = 20.0;

/// All signal values for one (reference, candidate) pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PairScore {
    /// Perceptual-hash Hamming distance, in [0, 64].
    pub phash_dist: u32,
    /// Difference-hash Hamming distance, in [0, 64].
    pub dhash_dist: u32,
    /// Local-feature similarity, in [0, 1].
    pub feature_sim: f64,
    /// Fallback-thumbnail similarity, in [0, 1].
    pub fallback_sim: f64,
    /// Combined score, lower is better.
    pub combined: f64,
}

/// The signal that carried a match, recorded per match for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMethod {
    /// Perceptual hash within the tier cap.
    Phash,
    /// Difference hash within the tier cap.
    Dhash,
    /// Local-feature similarity above the tier floor.
    Features,
    /// Fallback-thumbnail similarity above the tier floor.
    Fallback,
}

impl std::fmt::Display for MatchMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Phash => "phash",
            Self::Dhash => "dhash",
            Self::Features => "features",
            Self::Fallback => "fallback",
        };
        f.write_str(s)
    }
}

/// Score one (reference, candidate) signature pair.
pub fn score_pair(reference: &Signatures, candidate: &Signatures) -> PairScore {
    let phash_dist = reference.phash.distance(candidate.phash);
    let dhash_dist = reference.dhash.distance(candidate.dhash);
    let feature_sim = features::similarity(&reference.features, &candidate.features);
    let fallback_sim = fallback::similarity(&reference.thumb, &candidate.thumb);

    let effective = if feature_sim >= FEATURE_CONFIDENCE_FLOOR {
        feature_sim
    } else {
        fallback_sim
    };
    let hash_dist = phash_dist.min(dhash_dist) as f64;
    let combined = HASH_WEIGHT * hash_dist + FEATURE_WEIGHT * (1.0 - effective) * FEATURE_SCALE;

    PairScore {
        phash_dist,
        dhash_dist,
        feature_sim,
        fallback_sim,
        combined,
    }
}

/// Whether a pair clears at least one signal gate for the given tier.
///
/// Any single signal can carry admissibility.
pub fn admissible(score: &PairScore, tier: Tier) -> bool {
    let t = tier.thresholds();
    score.phash_dist <= t.phash_max
        || score.dhash_dist <= t.dhash_max
        || score.feature_sim >= t.feature_min
        || score.fallback_sim >= t.fallback_min
}

/// Which signal carried an admissible pair, under the given tier.
///
/// Hash signals take precedence; when both hashes pass, the smaller
/// distance names the method.
pub fn match_method(score: &PairScore, tier: Tier) -> MatchMethod {
    let t = tier.thresholds();
    let phash_ok = score.phash_dist <= t.phash_max;
    let dhash_ok = score.dhash_dist <= t.dhash_max;
    if phash_ok && dhash_ok {
        if score.phash_dist < score.dhash_dist {
            MatchMethod::Phash
        } else {
            MatchMethod::Dhash
        }
    } else if phash_ok {
        MatchMethod::Phash
    } else if dhash_ok {
        MatchMethod::Dhash
    } else if score.feature_sim >= t.feature_min {
        MatchMethod::Features
    } else {
        MatchMethod::Fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(phash: u32, dhash: u32, feat: f64, fall: f64) -> PairScore {
        let effective = if feat >= FEATURE_CONFIDENCE_FLOOR { feat } else { fall };
        PairScore {
            phash_dist: phash,
            dhash_dist: dhash,
            feature_sim: feat,
            fallback_sim: fall,
            combined: HASH_WEIGHT * phash.min(dhash) as f64
                + FEATURE_WEIGHT * (1.0 - effective) * FEATURE_SCALE,
        }
    }

    #[test]
    fn combined_score_weighs_best_hash_and_effective_feature() {
        let s = score(10, 4, 0.5, 0.9);
        // 0.55 * 4 + 0.45 * 0.5 * 20
        assert!((s.combined - (2.2 + 4.5)).abs() < 1e-12);
    }

    #[test]
    fn weak_features_fall_back_to_thumbnail_similarity() {
        let s = score(10, 10, 0.01, 0.9);
        // effective similarity comes from the fallback signal
        assert!((s.combined - (5.5 + 0.45 * 0.1 * 20.0)).abs() < 1e-12);
    }

    #[test]
    fn identical_pair_scores_zero() {
        let s = score(0, 0, 1.0, 1.0);
        assert_eq!(s.combined, 0.0);
    }

    #[test]
    fn any_single_signal_carries_admissibility() {
        assert!(admissible(&score(16, 60, 0.0, 0.0), Tier::Icon)); // phash
        assert!(admissible(&score(60, 16, 0.0, 0.0), Tier::Icon)); // dhash
        assert!(admissible(&score(60, 60, 0.08, 0.0), Tier::Icon)); // features
        assert!(admissible(&score(60, 60, 0.0, 0.82), Tier::Icon)); // fallback
        assert!(!admissible(&score(17, 17, 0.079, 0.819), Tier::Icon));
    }

    #[test]
    fn admissibility_respects_tier_caps() {
        let s = score(11, 11, 0.0, 0.0);
        assert!(admissible(&s, Tier::Icon));
        assert!(admissible(&s, Tier::Mid));
        assert!(!admissible(&s, Tier::Board));
    }

    #[test]
    fn loosening_tiers_never_loses_admissibility() {
        // BOARD gates are strictly tighter than MID, and MID than ICON:
        // anything admissible at a tighter tier stays admissible looser.
        let samples = [
            score(10, 64, 0.0, 0.0),
            score(64, 10, 0.0, 0.0),
            score(64, 64, 0.15, 0.0),
            score(64, 64, 0.0, 0.88),
            score(12, 13, 0.1, 0.84),
            score(64, 64, 0.0, 0.0),
        ];
        for s in &samples {
            if admissible(s, Tier::Board) {
                assert!(admissible(s, Tier::Mid));
            }
            if admissible(s, Tier::Mid) {
                assert!(admissible(s, Tier::Icon));
            }
        }
    }

    #[test]
    fn method_prefers_the_smaller_passing_hash() {
        assert_eq!(match_method(&score(3, 7, 0.0, 0.0), Tier::Mid), MatchMethod::Phash);
        assert_eq!(match_method(&score(7, 3, 0.0, 0.0), Tier::Mid), MatchMethod::Dhash);
        // Equal distances resolve to dhash, matching the strict less-than.
        assert_eq!(match_method(&score(5, 5, 0.0, 0.0), Tier::Mid), MatchMethod::Dhash);
    }

    #[test]
    fn method_falls_through_hash_then_features_then_fallback() {
        assert_eq!(match_method(&score(30, 11, 0.0, 0.0), Tier::Mid), MatchMethod::Dhash);
        assert_eq!(
            match_method(&score(30, 30, 0.2, 0.0), Tier::Mid),
            MatchMethod::Features
        );
        assert_eq!(
            match_method(&score(30, 30, 0.01, 0.9), Tier::Mid),
            MatchMethod::Fallback
        );
    }

    #[test]
    fn method_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&MatchMethod::Phash).unwrap(), "\"phash\"");
        assert_eq!(
            serde_json::to_string(&MatchMethod::Features).unwrap(),
            "\"features\""
        );
    }
}
