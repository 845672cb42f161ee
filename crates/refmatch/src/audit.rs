//! Miss records and tier-audit classification.
//!
//! Every unmatched reference gets a structured miss record: its top five
//! candidates with full score detail and per-tier admissibility, plus a
//! single audit class that separates extraction failures from assignment
//! competition and tier mislabeling. The audit re-derives admissibility
//! from the threshold table independently of the solver's edge set, so a
//! scorer/solver discrepancy is detectable rather than assumed away.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::score::{admissible, PairScore};
use crate::tier::{Tier, TierThresholds};

/// Why an unmatched reference missed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditClass {
    /// Top candidate passes some non-current tier but fails the current
    /// one; the reference may be mis-tiered.
    WrongTier,
    /// Top candidate passes no tier at all: a true extraction gap.
    NoTierMatches,
    /// Top candidate passes the current tier at audit time, yet the
    /// solver saw no edge for the pair. Indicates a scorer/solver
    /// discrepancy; never observed in a correct build.
    ThresholdMismatch,
    /// Top candidate passes the current tier and is unassigned, yet no
    /// match was made. Invariant violation; forces the verdict to FAIL.
    UnexpectedCurrentTierShouldMatch,
    /// Top candidate passes the current tier but the optimal assignment
    /// gave it to another reference.
    AssignmentCompetition,
}

impl AuditClass {
    /// Report label, identical to the serialized form.
    pub fn label(self) -> &'static str {
        match self {
            Self::WrongTier => "WRONG_TIER",
            Self::NoTierMatches => "NO_TIER_MATCHES",
            Self::ThresholdMismatch => "THRESHOLD_MISMATCH",
            Self::UnexpectedCurrentTierShouldMatch => "UNEXPECTED_CURRENT_TIER_SHOULD_MATCH",
            Self::AssignmentCompetition => "ASSIGNMENT_COMPETITION",
        }
    }
}

impl std::fmt::Display for AuditClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One ranked candidate inside a miss record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedCandidate {
    /// 1-based rank by ascending combined score.
    pub rank: usize,
    /// Candidate identifier (file stem).
    pub candidate_id: String,
    /// Candidate file name as listed in the manifest.
    pub file_name: String,
    /// Perceptual-hash distance.
    pub phash_dist: u32,
    /// Difference-hash distance.
    pub dhash_dist: u32,
    /// Local-feature similarity.
    pub feature_sim: f64,
    /// Fallback-thumbnail similarity.
    pub fallback_sim: f64,
    /// Combined score.
    pub combined_score: f64,
    /// Admissibility of this candidate under each tier's gates.
    pub admissible: BTreeMap<Tier, bool>,
    /// Reference currently holding this candidate, if any.
    pub held_by: Option<String>,
    /// Manifest pass-through metadata for the candidate.
    pub manifest: serde_json::Map<String, serde_json::Value>,
}

/// Structured diagnostic for one unmatched reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissRecord {
    /// Unmatched reference identifier.
    pub ref_id: String,
    /// The reference's tier.
    pub tier: Tier,
    /// Acceptance gates active for that tier.
    pub thresholds: TierThresholds,
    /// Audit classification of the miss.
    pub audit: AuditClass,
    /// Up to five best candidates by combined score.
    pub top_candidates: Vec<RankedCandidate>,
}

/// Admissibility of one pair under every tier.
pub fn tier_admissibility(score: &PairScore) -> BTreeMap<Tier, bool> {
    Tier::ALL
        .iter()
        .map(|&tier| (tier, admissible(score, tier)))
        .collect()
}

/// Classify a miss from its top candidate.
///
/// `held_by_other` says whether the top candidate was assigned to a
/// different reference; `solver_edge_present` says whether the solver's
/// admissibility graph contained the (reference, top-candidate) edge.
pub fn classify(
    tier: Tier,
    top: Option<&PairScore>,
    held_by_other: bool,
    solver_edge_present: bool,
) -> AuditClass {
    let Some(score) = top else {
        return AuditClass::NoTierMatches;
    };

    if admissible(score, tier) {
        if held_by_other {
            return AuditClass::AssignmentCompetition;
        }
        if !solver_edge_present {
            return AuditClass::ThresholdMismatch;
        }
        return AuditClass::UnexpectedCurrentTierShouldMatch;
    }

    let passes_elsewhere = Tier::ALL
        .iter()
        .any(|&other| other != tier && admissible(score, other));
    if passes_elsewhere {
        AuditClass::WrongTier
    } else {
        AuditClass::NoTierMatches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(phash: u32, dhash: u32, feat: f64, fall: f64) -> PairScore {
        PairScore {
            phash_dist: phash,
            dhash_dist: dhash,
            feature_sim: feat,
            fallback_sim: fall,
            combined: 0.0,
        }
    }

    #[test]
    fn no_candidates_is_a_tier_gap() {
        assert_eq!(classify(Tier::Icon, None, false, false), AuditClass::NoTierMatches);
    }

    #[test]
    fn nothing_passes_any_tier() {
        let score = pair(40, 40, 0.0, 0.1);
        assert_eq!(
            classify(Tier::Mid, Some(&score), false, false),
            AuditClass::NoTierMatches
        );
    }

    #[test]
    fn competition_when_the_winner_is_held_elsewhere() {
        let score = pair(4, 4, 0.9, 0.99);
        assert_eq!(
            classify(Tier::Board, Some(&score), true, true),
            AuditClass::AssignmentCompetition
        );
    }

    #[test]
    fn unassigned_admissible_top_is_an_invariant_violation() {
        let score = pair(4, 4, 0.9, 0.99);
        assert_eq!(
            classify(Tier::Board, Some(&score), false, true),
            AuditClass::UnexpectedCurrentTierShouldMatch
        );
    }

    #[test]
    fn missing_solver_edge_is_a_threshold_mismatch() {
        let score = pair(4, 4, 0.9, 0.99);
        assert_eq!(
            classify(Tier::Board, Some(&score), false, false),
            AuditClass::ThresholdMismatch
        );
    }

    #[test]
    fn icon_only_admissibility_flags_a_board_reference_as_wrong_tier() {
        // Distances in (10, 16]: pass ICON caps, fail MID and BOARD; both
        // similarity signals below every floor.
        let score = pair(14, 14, 0.0, 0.5);
        assert_eq!(
            classify(Tier::Board, Some(&score), false, false),
            AuditClass::WrongTier
        );

        let flags = tier_admissibility(&score);
        assert_eq!(flags[&Tier::Icon], true);
        assert_eq!(flags[&Tier::Mid], false);
        assert_eq!(flags[&Tier::Board], false);
    }

    #[test]
    fn competition_outranks_wrong_tier_for_current_tier_passes() {
        // Passes ICON and MID; reference is MID; candidate held elsewhere.
        let score = pair(12, 30, 0.0, 0.5);
        assert_eq!(
            classify(Tier::Mid, Some(&score), true, true),
            AuditClass::AssignmentCompetition
        );
    }

    #[test]
    fn audit_class_serializes_screaming_snake() {
        assert_eq!(
            serde_json::to_string(&AuditClass::AssignmentCompetition).unwrap(),
            "\"ASSIGNMENT_COMPETITION\""
        );
        assert_eq!(
            serde_json::to_string(&AuditClass::UnexpectedCurrentTierShouldMatch).unwrap(),
            "\"UNEXPECTED_CURRENT_TIER_SHOULD_MATCH\""
        );
        let back: AuditClass = serde_json::from_str("\"WRONG_TIER\"").unwrap();
        assert_eq!(back, AuditClass::WrongTier);
    }

    #[test]
    fn tier_admissibility_is_keyed_by_all_tiers_in_order() {
        let flags = tier_admissibility(&pair(0, 0, 1.0, 1.0));
        let keys: Vec<Tier> = flags.keys().copied().collect();
        assert_eq!(keys, vec![Tier::Icon, Tier::Mid, Tier::Board]);
        assert!(flags.values().all(|&v| v));
    }
}
