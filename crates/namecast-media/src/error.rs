//! Error type for external tool invocations.

use std::path::PathBuf;

use thiserror::Error;

use namecast_core::error::{AppError, ErrorKind};

/// Failures of the remux and transcode steps.
///
/// Variants that come from the tool itself carry the tail of its
/// diagnostic output for operator triage.
#[derive(Debug, Error)]
pub enum MediaError {
    /// The tool could not be started.
    #[error("Failed to start '{program}': {source}")]
    Spawn {
        /// Program that was invoked.
        program: String,
        /// Underlying spawn error.
        source: std::io::Error,
    },

    /// Remux exited nonzero or produced no output.
    #[error("Remux failed (exit code {code:?}): {diagnostics}")]
    RemuxFailed {
        /// Exit code, `None` when killed by a signal.
        code: Option<i32>,
        /// Trailing tool diagnostics.
        diagnostics: String,
    },

    /// Remux did not finish in time.
    #[error("Remux timed out after {timeout_seconds}s: {diagnostics}")]
    RemuxTimedOut {
        /// Configured timeout.
        timeout_seconds: u64,
        /// Trailing tool diagnostics.
        diagnostics: String,
    },

    /// Transcode exited nonzero.
    #[error("Transcode failed (exit code {code:?}): {diagnostics}")]
    TranscodeFailed {
        /// Exit code, `None` when killed by a signal.
        code: Option<i32>,
        /// Trailing tool diagnostics.
        diagnostics: String,
    },

    /// Transcode reported no progress within the stall window.
    #[error("Transcode made no progress for {stall_seconds}s: {diagnostics}")]
    TranscodeTimedOut {
        /// Configured stall window.
        stall_seconds: u64,
        /// Trailing tool diagnostics.
        diagnostics: String,
    },

    /// The manifest is missing, empty, or names segments that do not exist.
    #[error("Invalid manifest {path}: {reason}")]
    InvalidManifest {
        /// Manifest path.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },

    /// The surrounding request was cancelled and the tool was killed.
    #[error("{stage} cancelled")]
    Cancelled {
        /// Step that was running.
        stage: &'static str,
    },

    /// Filesystem error around the invocation.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// Machine-readable kind this error surfaces as.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RemuxFailed { .. } | Self::RemuxTimedOut { .. } => ErrorKind::RemuxFailed,
            Self::Spawn { .. } | Self::TranscodeFailed { .. } | Self::InvalidManifest { .. } => {
                ErrorKind::TranscodeFailed
            }
            Self::TranscodeTimedOut { .. } => ErrorKind::TranscodeTimedOut,
            Self::Cancelled { .. } => ErrorKind::FinalizeTimedOut,
            Self::Io(_) => ErrorKind::Storage,
        }
    }
}

impl From<MediaError> for AppError {
    fn from(err: MediaError) -> Self {
        let kind = err.kind();
        AppError::with_source(kind, err.to_string(), err)
    }
}
