//! Miss-packet emission: visual evidence for human review.
//!
//! One subdirectory per unmatched reference, each holding a copy of the
//! reference image, copies of its top five candidates, and a per-miss
//! `metrics.json`. A master `miss_packet.json` aggregates every miss
//! record. Layout and content follow the adjudication packets the
//! upstream pipeline produced for its review board.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::audit::MissRecord;
use crate::evaluate::Evaluation;

/// Master packet document written alongside the per-miss folders.
#[derive(Debug, Serialize)]
struct PacketIndex<'a> {
    total_misses: usize,
    misses: &'a [MissRecord],
}

// ── Error type ─────────────────────────────────────────────────────────────

/// Errors raised while writing the miss packet.
#[derive(Debug)]
pub enum PacketError {
    /// A directory or file could not be created or copied.
    Io {
        /// Offending path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// A packet document failed to serialize.
    Serialize(serde_json::Error),
}

impl std::fmt::Display for PacketError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "miss packet write failed at {}: {}", path.display(), source)
            }
            Self::Serialize(e) => write!(f, "failed to serialize miss packet: {e}"),
        }
    }
}

impl std::error::Error for PacketError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Serialize(e) => Some(e),
        }
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> PacketError + '_ {
    move |source| PacketError::Io {
        path: path.to_path_buf(),
        source,
    }
}

// ── Writing ────────────────────────────────────────────────────────────────

/// Write the miss-packet tree for all misses in the evaluation.
///
/// Existing files under `output_dir` are overwritten; the directory is
/// created if needed. Emission order follows the report's miss order, so
/// the tree is deterministic.
pub fn write_miss_packet(output_dir: &Path, evaluation: &Evaluation) -> Result<(), PacketError> {
    std::fs::create_dir_all(output_dir).map_err(io_err(output_dir))?;

    let ref_paths: BTreeMap<&str, &Path> = evaluation
        .references
        .iter()
        .map(|r| (r.ref_id.as_str(), r.path.as_path()))
        .collect();
    let cand_paths: BTreeMap<&str, (&Path, &str)> = evaluation
        .candidates
        .iter()
        .map(|c| (c.candidate_id.as_str(), (c.path.as_path(), c.file_name.as_str())))
        .collect();

    for miss in &evaluation.report.misses {
        let miss_dir = output_dir.join(&miss.ref_id);
        std::fs::create_dir_all(&miss_dir).map_err(io_err(&miss_dir))?;

        if let Some(&ref_path) = ref_paths.get(miss.ref_id.as_str()) {
            let file_name = ref_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| format!("{}.png", miss.ref_id));
            let dst = miss_dir.join(format!("reference_{file_name}"));
            std::fs::copy(ref_path, &dst).map_err(io_err(&dst))?;
        }

        for candidate in &miss.top_candidates {
            let Some(&(src, file_name)) = cand_paths.get(candidate.candidate_id.as_str()) else {
                continue;
            };
            let dst = miss_dir.join(format!("candidate_{:02}_{file_name}", candidate.rank));
            std::fs::copy(src, &dst).map_err(io_err(&dst))?;
        }

        let metrics_path = miss_dir.join("metrics.json");
        let mut json = serde_json::to_string_pretty(miss).map_err(PacketError::Serialize)?;
        json.push('\n');
        std::fs::write(&metrics_path, json).map_err(io_err(&metrics_path))?;
    }

    let index = PacketIndex {
        total_misses: evaluation.report.misses.len(),
        misses: &evaluation.report.misses,
    };
    let index_path = output_dir.join("miss_packet.json");
    let mut json = serde_json::to_string_pretty(&index).map_err(PacketError::Serialize)?;
    json.push('\n');
    std::fs::write(&index_path, json).map_err(io_err(&index_path))?;

    tracing::info!(
        misses = evaluation.report.misses.len(),
        "miss packet written to {}",
        output_dir.display(),
    );
    Ok(())
}
