//! Error kinds raised while deriving hazard layers.
//!
//! These travel inside [`anyhow::Error`] so callers can add context (e.g. the combination being
//! processed) and still recover the kind with `downcast_ref::<HazardError>()`.
use std::path::{Path, PathBuf};

/// The kinds of failure which abort a batch.
#[derive(Debug, thiserror::Error)]
pub enum HazardError {
    /// An input or output directory (or file) is missing, empty or unreadable.
    #[error("{}: {reason}", path.display())]
    Discovery {
        /// The path which could not be used.
        path: PathBuf,
        /// Description of the problem.
        reason: String,
    },

    /// A year range is inconsistent with a file's chunk or with a hazard's events.
    #[error("invalid year range: {reason}")]
    Range {
        /// Description of the problem.
        reason: String,
    },

    /// A file name does not follow the expected grammar or a raster lacks expected data.
    #[error("invalid format: {reason}")]
    Format {
        /// Description of the problem.
        reason: String,
    },

    /// Reading from or writing to a store failed.
    #[error("I/O error for {}: {source}", path.display())]
    Io {
        /// The file being read or written.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl HazardError {
    /// Create a [`HazardError::Discovery`]
    pub fn discovery(path: &Path, reason: impl Into<String>) -> Self {
        Self::Discovery {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Create a [`HazardError::Range`]
    pub fn range(reason: impl Into<String>) -> Self {
        Self::Range {
            reason: reason.into(),
        }
    }

    /// Create a [`HazardError::Format`]
    pub fn format(reason: impl Into<String>) -> Self {
        Self::Format {
            reason: reason.into(),
        }
    }

    /// Create a [`HazardError::Io`]
    pub fn io(path: &Path, source: impl Into<std::io::Error>) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source: source.into(),
        }
    }
}
