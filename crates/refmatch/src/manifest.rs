//! Extraction-manifest adapter.
//!
//! The upstream extractor writes a JSON manifest describing every
//! candidate it produced. The evaluator reads it once into an immutable
//! mapping and never writes it back. Only `file_name`, `width` and
//! `height` are interpreted; everything else is carried through verbatim
//! into diagnostic output.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// One candidate record from the manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestItem {
    /// Candidate file name, relative to the extracted directory.
    pub file_name: String,
    /// Pixel width as reported by the extractor.
    pub width: u32,
    /// Pixel height as reported by the extractor.
    pub height: u32,
    /// Pass-through metadata (page index, bounding box, quality metrics,
    /// ...). Not interpreted; surfaced in miss diagnostics.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// The complete manifest document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    /// Candidate records.
    #[serde(default)]
    pub items: Vec<ManifestItem>,
    /// Pass-through top-level metadata.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// ── Error type ─────────────────────────────────────────────────────────────

/// Errors raised while loading the manifest.
#[derive(Debug)]
pub enum ManifestError {
    /// The manifest file could not be read.
    Read {
        /// Offending path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The document is not the expected JSON encoding, or required
    /// fields are missing or of the wrong type.
    Parse {
        /// Offending path.
        path: PathBuf,
        /// Underlying decode error.
        source: serde_json::Error,
    },
    /// A record is structurally valid JSON but semantically malformed.
    Item {
        /// `file_name` of the offending record.
        file_name: String,
        /// What is wrong with it.
        reason: String,
    },
}

impl std::fmt::Display for ManifestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { path, source } => {
                write!(f, "failed to read manifest {}: {}", path.display(), source)
            }
            Self::Parse { path, source } => {
                write!(f, "malformed manifest {}: {}", path.display(), source)
            }
            Self::Item { file_name, reason } => {
                write!(f, "malformed manifest record {file_name:?}: {reason}")
            }
        }
    }
}

impl std::error::Error for ManifestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Item { .. } => None,
        }
    }
}

// ── Loading ────────────────────────────────────────────────────────────────

/// Load and validate the manifest.
///
/// Rejects non-JSON encodings, missing required fields, zero dimensions,
/// empty file names and duplicate file names.
pub fn load_manifest(path: &Path) -> Result<Manifest, ManifestError> {
    let bytes = std::fs::read(path).map_err(|source| ManifestError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let manifest: Manifest =
        serde_json::from_slice(&bytes).map_err(|source| ManifestError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    let mut seen = std::collections::BTreeSet::new();
    for item in &manifest.items {
        if item.file_name.is_empty() {
            return Err(ManifestError::Item {
                file_name: item.file_name.clone(),
                reason: "empty file_name".into(),
            });
        }
        if item.width == 0 || item.height == 0 {
            return Err(ManifestError::Item {
                file_name: item.file_name.clone(),
                reason: format!("non-positive dimensions {}x{}", item.width, item.height),
            });
        }
        if !seen.insert(item.file_name.as_str()) {
            return Err(ManifestError::Item {
                file_name: item.file_name.clone(),
                reason: "duplicate file_name".into(),
            });
        }
    }

    tracing::debug!(items = manifest.items.len(), "loaded manifest");
    Ok(manifest)
}
