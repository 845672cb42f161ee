//! Evaluation pipeline orchestration.
//!
//! Composes the leaf stages into one run: enumerate and decode the
//! reference set, decode the manifest-listed candidate pool, score every
//! pair, solve the optimal assignment, and assemble the report with miss
//! records and tier audits. All state lives for one invocation; the
//! filesystem is only read here, never written.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use nalgebra::DMatrix;
use rayon::prelude::*;

use crate::assign::{self, UNASSIGNABLE};
use crate::audit::{self, AuditClass, MissRecord, RankedCandidate};
use crate::imageio::{self, DecodeError};
use crate::manifest::{self, ManifestError, ManifestItem};
use crate::report::{
    AcceptanceCriteria, CeilingNotice, EvalReport, MatchRecord, TierRecall, Verdict,
};
use crate::score::{self, PairScore};
use crate::signature::{self, Signatures};
use crate::tier::Tier;
use crate::{FALSE_POSITIVE_TARGET, RECALL_TARGET};

/// Number of ranked candidates retained per miss record.
const MISS_TOP_N: usize = 5;

/// Inputs and options for one evaluation run.
#[derive(Debug, Clone)]
pub struct EvalConfig {
    /// Directory of reference (truth) images.
    pub reference_dir: PathBuf,
    /// Directory of extracted candidate images.
    pub extracted_dir: PathBuf,
    /// Path to the extraction manifest (JSON).
    pub manifest_path: PathBuf,
    /// Score pairs on the rayon pool. The result is byte-identical to a
    /// serial run; only wall-clock changes.
    pub parallel: bool,
}

/// Reference bookkeeping retained after signatures are dropped.
#[derive(Debug, Clone)]
pub struct ReferenceMeta {
    /// Identifier: file stem.
    pub ref_id: String,
    /// File name inside the reference directory.
    pub file_name: String,
    /// Full path.
    pub path: PathBuf,
    /// Decoded pixel width.
    pub width: u32,
    /// Decoded pixel height.
    pub height: u32,
    /// Size tier.
    pub tier: Tier,
}

/// Candidate bookkeeping retained after signatures are dropped.
#[derive(Debug, Clone)]
pub struct CandidateMeta {
    /// Identifier: file stem of the manifest file name.
    pub candidate_id: String,
    /// File name as listed in the manifest.
    pub file_name: String,
    /// Full path inside the extracted directory.
    pub path: PathBuf,
    /// The manifest record.
    pub item: ManifestItem,
}

/// Result of one evaluation run.
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// The report, ready for serialization.
    pub report: EvalReport,
    /// References in sorted id order (row order of the run).
    pub references: Vec<ReferenceMeta>,
    /// Candidates in sorted file-name order (column order of the run).
    pub candidates: Vec<CandidateMeta>,
}

// ── Error type ─────────────────────────────────────────────────────────────

/// Fatal evaluation errors. Every variant carries a machine-readable
/// code; no partial report is written when one is raised.
#[derive(Debug)]
pub enum EvalError {
    /// A required input path does not exist.
    InputMissing {
        /// Which input: "reference directory", "extracted directory",
        /// or "manifest".
        what: &'static str,
        /// The missing path.
        path: PathBuf,
    },
    /// A reference or manifest-listed candidate failed to load.
    Decode {
        /// "reference" or "candidate".
        role: &'static str,
        /// Underlying loader error.
        source: DecodeError,
    },
    /// The manifest is malformed.
    Manifest(ManifestError),
}

impl EvalError {
    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InputMissing { .. } => "input-missing",
            Self::Decode { .. } => "decode-failure",
            Self::Manifest(_) => "manifest-malformed",
        }
    }
}

impl std::fmt::Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InputMissing { what, path } => {
                write!(f, "{what} not found: {}", path.display())
            }
            Self::Decode { role, source } => write!(f, "{role} image unusable: {source}"),
            Self::Manifest(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for EvalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InputMissing { .. } => None,
            Self::Decode { source, .. } => Some(source),
            Self::Manifest(e) => Some(e),
        }
    }
}

impl From<ManifestError> for EvalError {
    fn from(e: ManifestError) -> Self {
        Self::Manifest(e)
    }
}

// ── Loading ────────────────────────────────────────────────────────────────

struct LoadedRef {
    meta: ReferenceMeta,
    sigs: Signatures,
}

struct LoadedCand {
    meta: CandidateMeta,
    sigs: Signatures,
}

fn require_dir(what: &'static str, path: &Path) -> Result<(), EvalError> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(EvalError::InputMissing {
            what,
            path: path.to_path_buf(),
        })
    }
}

/// Enumerate image files in the reference directory, sorted by file
/// name. Non-image files are skipped with a warning.
fn reference_paths(dir: &Path) -> Result<Vec<PathBuf>, EvalError> {
    let entries = std::fs::read_dir(dir).map_err(|_| EvalError::InputMissing {
        what: "reference directory",
        path: dir.to_path_buf(),
    })?;

    let mut paths = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if imageio::is_image_file(&path) {
            paths.push(path);
        } else {
            tracing::warn!("ignoring non-image file {}", path.display());
        }
    }
    paths.sort_by_key(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()));
    Ok(paths)
}

fn load_reference(path: &Path) -> Result<LoadedRef, EvalError> {
    let image = imageio::load_image(path).map_err(|source| EvalError::Decode {
        role: "reference",
        source,
    })?;
    let (width, height) = (image.width(), image.height());
    Ok(LoadedRef {
        meta: ReferenceMeta {
            ref_id: imageio::stem_id(path),
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            path: path.to_path_buf(),
            width,
            height,
            tier: Tier::classify(width, height),
        },
        sigs: signature::extract(&image),
    })
}

fn load_candidate(extracted_dir: &Path, item: &ManifestItem) -> Result<LoadedCand, EvalError> {
    let path = extracted_dir.join(&item.file_name);
    let image = imageio::load_image(&path).map_err(|source| EvalError::Decode {
        role: "candidate",
        source,
    })?;
    if (image.width(), image.height()) != (item.width, item.height) {
        tracing::warn!(
            "manifest dimensions {}x{} disagree with decoded {}x{} for {}",
            item.width,
            item.height,
            image.width(),
            image.height(),
            item.file_name,
        );
    }
    Ok(LoadedCand {
        meta: CandidateMeta {
            candidate_id: imageio::stem_id(Path::new(&item.file_name)),
            file_name: item.file_name.clone(),
            path,
            item: item.clone(),
        },
        sigs: signature::extract(&image),
    })
}

/// Warn about image files on disk that the manifest does not mention.
/// They take no part in scoring and are counted neither as matches nor
/// as false positives.
fn warn_unlisted(extracted_dir: &Path, listed: &BTreeSet<&str>) {
    let Ok(entries) = std::fs::read_dir(extracted_dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() || !imageio::is_image_file(&path) {
            continue;
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !listed.contains(name.as_str()) {
            tracing::warn!("extracted file {} not in manifest; skipping", name);
        }
    }
}

// ── Pipeline ───────────────────────────────────────────────────────────────

/// Run one complete evaluation.
pub fn evaluate(cfg: &EvalConfig) -> Result<Evaluation, EvalError> {
    require_dir("reference directory", &cfg.reference_dir)?;
    require_dir("extracted directory", &cfg.extracted_dir)?;
    if !cfg.manifest_path.is_file() {
        return Err(EvalError::InputMissing {
            what: "manifest",
            path: cfg.manifest_path.clone(),
        });
    }

    let manifest = manifest::load_manifest(&cfg.manifest_path)?;

    // References end up in sorted ref_id order; that is the row order of
    // every downstream stage and of the report.
    let ref_paths = reference_paths(&cfg.reference_dir)?;
    let mut references: Vec<LoadedRef> = if cfg.parallel {
        ref_paths
            .par_iter()
            .map(|p| load_reference(p))
            .collect::<Result<_, _>>()?
    } else {
        ref_paths
            .iter()
            .map(|p| load_reference(p))
            .collect::<Result<_, _>>()?
    };
    references.sort_by(|a, b| a.meta.ref_id.cmp(&b.meta.ref_id));
    references.dedup_by(|b, a| {
        let dup = a.meta.ref_id == b.meta.ref_id;
        if dup {
            tracing::warn!(
                "duplicate reference identifier {}; keeping {}, ignoring {}",
                a.meta.ref_id,
                a.meta.file_name,
                b.meta.file_name,
            );
        }
        dup
    });

    // Candidates in sorted manifest file-name order.
    let mut items: Vec<&ManifestItem> = manifest.items.iter().collect();
    items.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    let candidates: Vec<LoadedCand> = if cfg.parallel {
        items
            .par_iter()
            .map(|item| load_candidate(&cfg.extracted_dir, item))
            .collect::<Result<_, _>>()?
    } else {
        items
            .iter()
            .map(|item| load_candidate(&cfg.extracted_dir, item))
            .collect::<Result<_, _>>()?
    };
    check_unique_candidate_ids(&candidates)?;

    let listed: BTreeSet<&str> = items.iter().map(|i| i.file_name.as_str()).collect();
    warn_unlisted(&cfg.extracted_dir, &listed);

    let n_refs = references.len();
    let n_cands = candidates.len();
    tracing::info!(references = n_refs, candidates = n_cands, "scoring pairs");

    // Pairwise scores, rows in reference order, columns in candidate order.
    let cand_sigs: Vec<&Signatures> = candidates.iter().map(|c| &c.sigs).collect();
    let score_row = |r: &LoadedRef| -> Vec<PairScore> {
        cand_sigs
            .iter()
            .map(|sigs| score::score_pair(&r.sigs, sigs))
            .collect()
    };
    let scores: Vec<Vec<PairScore>> = if cfg.parallel {
        references.par_iter().map(score_row).collect()
    } else {
        references.iter().map(score_row).collect()
    };

    // Admissibility graph under each reference's own tier.
    let edges: Vec<Vec<bool>> = references
        .iter()
        .zip(scores.iter())
        .map(|(r, row)| {
            row.iter()
                .map(|s| score::admissible(s, r.meta.tier))
                .collect()
        })
        .collect();

    // Optimal assignment over admissible pairs.
    let cost = DMatrix::from_fn(n_refs, n_cands, |i, j| {
        if edges[i][j] {
            scores[i][j].combined
        } else {
            UNASSIGNABLE
        }
    });
    let assignment = assign::solve(&cost);

    let mut holder_of_candidate: Vec<Option<usize>> = vec![None; n_cands];
    for (i, assigned) in assignment.iter().enumerate() {
        if let Some(j) = assigned {
            holder_of_candidate[*j] = Some(i);
        }
    }

    // Matches, in reference order.
    let mut matches = Vec::new();
    for (i, reference) in references.iter().enumerate() {
        let Some(j) = assignment[i] else {
            continue;
        };
        let s = &scores[i][j];
        matches.push(MatchRecord {
            ref_id: reference.meta.ref_id.clone(),
            candidate_id: candidates[j].meta.candidate_id.clone(),
            combined_score: s.combined,
            method: score::match_method(s, reference.meta.tier),
            phash_dist: s.phash_dist,
            dhash_dist: s.dhash_dist,
            feature_sim: s.feature_sim,
            fallback_sim: s.fallback_sim,
            tier: reference.meta.tier,
        });
    }

    // Unassigned candidates are false positives.
    let mut false_positives: Vec<String> = holder_of_candidate
        .iter()
        .enumerate()
        .filter(|(_, holder)| holder.is_none())
        .map(|(j, _)| candidates[j].meta.candidate_id.clone())
        .collect();
    false_positives.sort();

    // Miss records and audits, in reference order.
    let mut misses = Vec::new();
    let mut invariant_violations = Vec::new();
    for (i, reference) in references.iter().enumerate() {
        if assignment[i].is_some() {
            continue;
        }
        let miss = build_miss(
            reference,
            &scores[i],
            &edges[i],
            &candidates,
            &references,
            &holder_of_candidate,
        );
        if miss.audit == AuditClass::UnexpectedCurrentTierShouldMatch {
            tracing::warn!(
                "invariant violation: {} should have matched {}",
                miss.ref_id,
                miss.top_candidates
                    .first()
                    .map(|c| c.candidate_id.as_str())
                    .unwrap_or("<none>"),
            );
            invariant_violations.push(format!(
                "unmatched reference {} has an unassigned admissible top candidate",
                miss.ref_id
            ));
        }
        misses.push(miss);
    }

    // Per-tier breakdown over all three tiers.
    let per_tier = Tier::ALL
        .iter()
        .map(|&tier| {
            let refs = references.iter().filter(|r| r.meta.tier == tier).count();
            let tier_matches = matches.iter().filter(|m| m.tier == tier).count();
            let recall = if refs > 0 {
                tier_matches as f64 / refs as f64
            } else {
                0.0
            };
            (
                tier,
                TierRecall {
                    references: refs,
                    matches: tier_matches,
                    recall,
                },
            )
        })
        .collect();

    let recall = if n_refs > 0 {
        matches.len() as f64 / n_refs as f64
    } else {
        0.0
    };
    let ceiling_notice = (n_cands < n_refs).then(|| CeilingNotice {
        extracted_count: n_cands,
        reference_count: n_refs,
        max_possible_recall: if n_refs > 0 {
            n_cands as f64 / n_refs as f64
        } else {
            0.0
        },
    });
    if let Some(notice) = &ceiling_notice {
        tracing::warn!(
            "candidate pool ceiling: {}/{} caps recall at {:.4}",
            notice.extracted_count,
            notice.reference_count,
            notice.max_possible_recall,
        );
    }

    let gates_met = recall >= RECALL_TARGET && false_positives.len() <= FALSE_POSITIVE_TARGET;
    let verdict = if gates_met && invariant_violations.is_empty() {
        Verdict::Pass
    } else {
        Verdict::Fail
    };

    let report = EvalReport {
        recall,
        recall_numerator: matches.len(),
        recall_denominator: n_refs,
        false_positive_count: false_positives.len(),
        verdict,
        ceiling_notice,
        per_tier,
        matches,
        false_positives,
        misses,
        invariant_violations,
        acceptance_criteria: AcceptanceCriteria::default(),
    };

    Ok(Evaluation {
        report,
        references: references.into_iter().map(|r| r.meta).collect(),
        candidates: candidates.into_iter().map(|c| c.meta).collect(),
    })
}

/// Candidate identifiers are manifest-derived; a stem collision (same
/// name, different extensions) would make the match set ambiguous, so
/// the manifest is at fault.
fn check_unique_candidate_ids(candidates: &[LoadedCand]) -> Result<(), EvalError> {
    let mut seen = BTreeSet::new();
    for candidate in candidates {
        if !seen.insert(candidate.meta.candidate_id.as_str()) {
            return Err(EvalError::Manifest(ManifestError::Item {
                file_name: candidate.meta.file_name.clone(),
                reason: "duplicate candidate identifier".into(),
            }));
        }
    }
    Ok(())
}

fn build_miss(
    reference: &LoadedRef,
    row: &[PairScore],
    edge_row: &[bool],
    candidates: &[LoadedCand],
    references: &[LoadedRef],
    holder_of_candidate: &[Option<usize>],
) -> MissRecord {
    // Rank candidates by combined score, candidate id breaking ties.
    let mut order: Vec<usize> = (0..row.len()).collect();
    order.sort_by(|&a, &b| {
        row[a]
            .combined
            .partial_cmp(&row[b].combined)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                candidates[a]
                    .meta
                    .candidate_id
                    .cmp(&candidates[b].meta.candidate_id)
            })
    });

    let top_candidates: Vec<RankedCandidate> = order
        .iter()
        .take(MISS_TOP_N)
        .enumerate()
        .map(|(rank, &j)| {
            let s = &row[j];
            let cand = &candidates[j].meta;
            let mut manifest_extra = cand.item.extra.clone();
            manifest_extra.insert("width".into(), cand.item.width.into());
            manifest_extra.insert("height".into(), cand.item.height.into());
            RankedCandidate {
                rank: rank + 1,
                candidate_id: cand.candidate_id.clone(),
                file_name: cand.file_name.clone(),
                phash_dist: s.phash_dist,
                dhash_dist: s.dhash_dist,
                feature_sim: s.feature_sim,
                fallback_sim: s.fallback_sim,
                combined_score: s.combined,
                admissible: audit::tier_admissibility(s),
                held_by: holder_of_candidate[j].map(|i| references[i].meta.ref_id.clone()),
                manifest: manifest_extra,
            }
        })
        .collect();

    let audit_class = match order.first() {
        None => audit::classify(reference.meta.tier, None, false, false),
        Some(&top_j) => audit::classify(
            reference.meta.tier,
            Some(&row[top_j]),
            holder_of_candidate[top_j].is_some(),
            edge_row[top_j],
        ),
    };

    MissRecord {
        ref_id: reference.meta.ref_id.clone(),
        tier: reference.meta.tier,
        thresholds: reference.meta.tier.thresholds(),
        audit: audit_class,
        top_candidates,
    }
}
