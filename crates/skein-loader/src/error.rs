//! Archive access errors.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while scanning or decoding a mounted archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The archive file could not be opened or decoded.
    #[error("failed to read archive {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The archive does not (or no longer) contain the entry.
    #[error("entry '{entry}' not found in {}", archive.display())]
    EntryNotFound { archive: PathBuf, entry: String },

    /// The file name does not carry a supported archive extension.
    #[error("unsupported archive format: {}", .0.display())]
    Unsupported(PathBuf),
}

impl ArchiveError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for archive operations.
pub type ArchiveResult<T> = Result<T, ArchiveError>;
