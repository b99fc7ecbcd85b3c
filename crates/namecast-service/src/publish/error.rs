//! Publish failures.

use std::path::PathBuf;

use thiserror::Error;

use namecast_core::error::{AppError, ErrorKind};

/// Why a publish did not complete.
#[derive(Debug, Error)]
pub enum PublishError {
    /// An object upload failed on every attempt.
    #[error("Upload of '{key}' failed on attempt {attempt}/{max_attempts}: {source}")]
    Upload {
        /// Object key.
        key: String,
        /// Attempt that failed last (1-based).
        attempt: u32,
        /// Attempts allowed.
        max_attempts: u32,
        /// Error of the last attempt.
        source: AppError,
    },

    /// A local artifact could not be read.
    #[error("Failed to read {path}: {source}")]
    Read {
        /// Artifact path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The artifact path has no usable file name.
    #[error("Artifact {0} has no file name")]
    BadArtifact(PathBuf),

    /// The surrounding request was cancelled before every object was stored.
    #[error("Publish cancelled")]
    Cancelled,
}

impl From<PublishError> for AppError {
    fn from(err: PublishError) -> Self {
        let kind = match err {
            PublishError::Cancelled => ErrorKind::FinalizeTimedOut,
            _ => ErrorKind::PublishFailed,
        };
        AppError::with_source(kind, err.to_string(), err)
    }
}
