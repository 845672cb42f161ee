//! Evaluation report structures and the JSON report writer.
//!
//! The report is the primary machine-readable artifact of a run. All
//! collections are emitted in deterministic order: matches and misses by
//! reference id, false positives sorted, per-tier stats in tier order.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::audit::MissRecord;
use crate::score::MatchMethod;
use crate::tier::Tier;
use crate::{FALSE_POSITIVE_TARGET, RECALL_TARGET};

/// Overall acceptance verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    /// Recall and false-positive gates both met, no invariant violation.
    Pass,
    /// Any gate missed, or an invariant violation was recorded.
    Fail,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
        })
    }
}

/// One accepted reference→candidate match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRecord {
    /// Reference identifier.
    pub ref_id: String,
    /// Candidate identifier.
    pub candidate_id: String,
    /// Combined score of the pair (lower is better).
    pub combined_score: f64,
    /// Signal that carried the match.
    pub method: MatchMethod,
    /// Perceptual-hash distance.
    pub phash_dist: u32,
    /// Difference-hash distance.
    pub dhash_dist: u32,
    /// Local-feature similarity.
    pub feature_sim: f64,
    /// Fallback-thumbnail similarity.
    pub fallback_sim: f64,
    /// Tier of the matched reference.
    pub tier: Tier,
}

/// Informational marker that the candidate pool caps achievable recall.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CeilingNotice {
    /// Number of decoded candidates.
    pub extracted_count: usize,
    /// Number of references.
    pub reference_count: usize,
    /// `extracted_count / reference_count`.
    pub max_possible_recall: f64,
}

/// Recall breakdown for one tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierRecall {
    /// References classified into this tier.
    pub references: usize,
    /// Matches won by this tier.
    pub matches: usize,
    /// `matches / references`, 0 when the tier is empty.
    pub recall: f64,
}

/// The acceptance gate constants, recorded so downstream consumers need
/// not hard-code them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AcceptanceCriteria {
    /// Minimum recall for PASS.
    pub recall_target: f64,
    /// Maximum false positives for PASS.
    pub false_positive_target: usize,
}

impl Default for AcceptanceCriteria {
    fn default() -> Self {
        Self {
            recall_target: RECALL_TARGET,
            false_positive_target: FALSE_POSITIVE_TARGET,
        }
    }
}

/// The complete evaluation report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalReport {
    /// Fraction of references matched, in [0, 1].
    pub recall: f64,
    /// Number of matches.
    pub recall_numerator: usize,
    /// Number of references.
    pub recall_denominator: usize,
    /// Candidates matched to no reference.
    pub false_positive_count: usize,
    /// Acceptance verdict.
    pub verdict: Verdict,
    /// Present when the candidate pool is smaller than the reference set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ceiling_notice: Option<CeilingNotice>,
    /// Per-tier recall breakdown, in tier order.
    pub per_tier: BTreeMap<Tier, TierRecall>,
    /// All matches, ordered by reference id.
    pub matches: Vec<MatchRecord>,
    /// Unmatched candidate ids, sorted.
    pub false_positives: Vec<String>,
    /// Miss records, ordered by reference id.
    pub misses: Vec<MissRecord>,
    /// Invariant violations observed during auditing. Non-empty forces
    /// the verdict to FAIL.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub invariant_violations: Vec<String>,
    /// Gate constants used for the verdict.
    pub acceptance_criteria: AcceptanceCriteria,
}

// ── Error type ─────────────────────────────────────────────────────────────

/// Errors raised while writing a report.
#[derive(Debug)]
pub enum ReportError {
    /// Serialization failed.
    Serialize(serde_json::Error),
    /// The file could not be written.
    Write {
        /// Destination path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

impl std::fmt::Display for ReportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Serialize(e) => write!(f, "failed to serialize report: {e}"),
            Self::Write { path, source } => {
                write!(f, "failed to write report {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for ReportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Serialize(e) => Some(e),
            Self::Write { source, .. } => Some(source),
        }
    }
}

// ── Writing ────────────────────────────────────────────────────────────────

/// Serialize the report to pretty JSON with a trailing newline.
pub fn to_json(report: &EvalReport) -> Result<String, ReportError> {
    let mut json = serde_json::to_string_pretty(report).map_err(ReportError::Serialize)?;
    json.push('\n');
    Ok(json)
}

/// Write the report to disk.
pub fn write_report(path: &Path, report: &EvalReport) -> Result<(), ReportError> {
    let json = to_json(report)?;
    std::fs::write(path, json).map_err(|source| ReportError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!("report written to {}", path.display());
    Ok(())
}
