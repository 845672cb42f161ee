//! Byte-safe image loading.
//!
//! Decoders that open files by name are subject to platform narrow-string
//! path handling; the upstream pipeline lost images to exactly that on
//! non-ASCII paths. The loader here reads raw bytes through the OS path
//! type and decodes from memory, so the decoder never sees a filename.

use std::path::{Path, PathBuf};

use image::DynamicImage;

/// Extensions treated as image files when scanning input directories.
const IMAGE_EXTENSIONS: [&str; 8] = ["png", "jpg", "jpeg", "bmp", "gif", "tif", "tiff", "webp"];

// ── Error type ─────────────────────────────────────────────────────────────

/// Errors that can occur while loading an image from disk.
#[derive(Debug)]
pub enum DecodeError {
    /// The file could not be read.
    Read {
        /// Offending path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The file bytes could not be decoded as an image.
    Decode {
        /// Offending path.
        path: PathBuf,
        /// Underlying decoder error.
        source: image::ImageError,
    },
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { path, source } => {
                write!(f, "failed to read {}: {}", path.display(), source)
            }
            Self::Decode { path, source } => {
                write!(f, "failed to decode {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            Self::Decode { source, .. } => Some(source),
        }
    }
}

// ── Loading ────────────────────────────────────────────────────────────────

/// Load an image by reading its bytes first and decoding from memory.
///
/// The path is handed to the filesystem as-is (OS byte semantics), so
/// non-ASCII characters in directory or file names are preserved.
pub fn load_image(path: &Path) -> Result<DynamicImage, DecodeError> {
    let bytes = std::fs::read(path).map_err(|source| DecodeError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    image::load_from_memory(&bytes).map_err(|source| DecodeError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

/// Whether a path carries a recognized image extension.
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            IMAGE_EXTENSIONS.iter().any(|known| *known == e)
        })
        .unwrap_or(false)
}

/// File stem as a string identifier (basename without extension).
pub fn stem_id(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
