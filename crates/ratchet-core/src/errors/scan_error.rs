//! File scanning errors.

use std::path::PathBuf;

/// Per-file conditions raised while reading candidate files.
///
/// These are surfaced, never swallowed: the suite runner accumulates them
/// alongside partial results so one unreadable file does not abort a run,
/// but the caller always sees that the file was skipped.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("IO error accessing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("File is not valid UTF-8: {path}")]
    NonUtf8 { path: PathBuf },

    #[error("Walk error under {root}: {message}")]
    Walk { root: PathBuf, message: String },
}

impl ScanError {
    /// Classify an `io::Error` for `path` into the matching variant.
    pub fn from_io(path: PathBuf, source: std::io::Error) -> Self {
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::InvalidData => Self::NonUtf8 { path },
            _ => Self::Io { path, source },
        }
    }
}
