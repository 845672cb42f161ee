//! refmatch — reference-to-extracted image matching evaluator.
//!
//! Measures how faithfully an upstream extraction pipeline recovered a
//! known reference set of component images. The pipeline stages are:
//!
//! 1. **Image I/O** – byte-safe decoding of reference and candidate files.
//! 2. **Signatures** – perceptual hash, difference hash, binary local
//!    features, grayscale fallback thumbnail.
//! 3. **Tier** – ICON/MID/BOARD size classification selecting acceptance
//!    thresholds.
//! 4. **Score** – per-pair distances, combined score, tier admissibility.
//! 5. **Assign** – globally optimal one-to-one matching over admissible
//!    pairs (minimum-cost bipartite assignment).
//! 6. **Audit** – miss records with top candidates and a tier-audit
//!    classification for every unmatched reference.
//! 7. **Report** – JSON evaluation report and optional miss-packet
//!    directory tree for human review.
//!
//! # Public API
//! The stable surface is intentionally small:
//! - [`evaluate`] with [`EvalConfig`] as the primary entry point
//! - [`EvalReport`] and its record types for report consumers
//! - [`write_report`] and [`write_miss_packet`] for emission
//!
//! Signature extraction and the assignment solver are exposed for
//! inspection tooling but are not tuning surfaces.

pub mod assign;
pub mod audit;
pub mod evaluate;
pub mod imageio;
pub mod manifest;
pub mod packet;
pub mod report;
pub mod score;
pub mod signature;
pub mod tier;

#[cfg(test)]
mod test_utils;

pub use evaluate::{evaluate, CandidateMeta, EvalConfig, EvalError, Evaluation, ReferenceMeta};
pub use imageio::{load_image, DecodeError};
pub use manifest::{Manifest, ManifestError, ManifestItem};
pub use packet::write_miss_packet;
pub use report::{
    write_report, CeilingNotice, EvalReport, MatchRecord, TierRecall, Verdict,
};
pub use score::{MatchMethod, PairScore};
pub use tier::{Tier, TierThresholds};

/// Acceptance gate: minimum recall for a PASS verdict.
pub const RECALL_TARGET: f64 = 0.90;

/// Acceptance gate: maximum false-positive count for a PASS verdict.
pub const FALSE_POSITIVE_TARGET: usize = 2;
