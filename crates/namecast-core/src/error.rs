//! Unified application error types for Namecast.
//!
//! All crates map their internal errors into [`AppError`] for consistent
//! propagation through the ? operator. The [`ErrorKind`] is the
//! machine-readable part handed back to callers of the ingest pipeline.

use std::fmt;
use thiserror::Error;

/// Top-level error kind categorization used across the entire application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// A chunk exceeded the per-chunk size ceiling.
    ChunkTooLarge,
    /// A required request field was empty or zero.
    MissingField,
    /// No upload session exists for the given identifier.
    UnknownUploadSession,
    /// A chunk index fell outside `0..total_chunks`.
    ChunkIndexOutOfRange,
    /// An upload declared more chunks than a session may hold.
    TooManyChunks,
    /// A chunk disagreed with the session it targets.
    SessionMismatch,
    /// Reassembly was attempted with empty chunk slots.
    IncompleteSession,
    /// Another finalize for the same upload is already running.
    FinalizeInProgress,
    /// The remux step failed or timed out.
    RemuxFailed,
    /// The transcoding tool exited nonzero or produced unusable output.
    TranscodeFailed,
    /// The transcoding tool made no progress within its window.
    TranscodeTimedOut,
    /// An object upload exhausted its retries.
    PublishFailed,
    /// The record store rejected the final commit.
    CommitFailed,
    /// The overall finalize deadline expired.
    FinalizeTimedOut,
    /// The requested resource was not found.
    NotFound,
    /// Input validation failed.
    Validation,
    /// A storage I/O error occurred.
    Storage,
    /// A database error occurred.
    Database,
    /// A configuration error occurred.
    Configuration,
    /// A serialization/deserialization error occurred.
    Serialization,
    /// An internal error occurred.
    Internal,
}

impl ErrorKind {
    /// Whether the error was caused by the caller's input rather than the system.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::ChunkTooLarge
                | Self::MissingField
                | Self::UnknownUploadSession
                | Self::ChunkIndexOutOfRange
                | Self::TooManyChunks
                | Self::SessionMismatch
                | Self::FinalizeInProgress
                | Self::Validation
                | Self::NotFound
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChunkTooLarge => write!(f, "CHUNK_TOO_LARGE"),
            Self::MissingField => write!(f, "MISSING_FIELD"),
            Self::UnknownUploadSession => write!(f, "UNKNOWN_UPLOAD_SESSION"),
            Self::ChunkIndexOutOfRange => write!(f, "CHUNK_INDEX_OUT_OF_RANGE"),
            Self::TooManyChunks => write!(f, "TOO_MANY_CHUNKS"),
            Self::SessionMismatch => write!(f, "SESSION_MISMATCH"),
            Self::IncompleteSession => write!(f, "INCOMPLETE_SESSION"),
            Self::FinalizeInProgress => write!(f, "FINALIZE_IN_PROGRESS"),
            Self::RemuxFailed => write!(f, "REMUX_FAILED"),
            Self::TranscodeFailed => write!(f, "TRANSCODE_FAILED"),
            Self::TranscodeTimedOut => write!(f, "TRANSCODE_TIMED_OUT"),
            Self::PublishFailed => write!(f, "PUBLISH_FAILED"),
            Self::CommitFailed => write!(f, "COMMIT_FAILED"),
            Self::FinalizeTimedOut => write!(f, "FINALIZE_TIMED_OUT"),
            Self::NotFound => write!(f, "NOT_FOUND"),
            Self::Validation => write!(f, "VALIDATION"),
            Self::Storage => write!(f, "STORAGE"),
            Self::Database => write!(f, "DATABASE"),
            Self::Configuration => write!(f, "CONFIGURATION"),
            Self::Serialization => write!(f, "SERIALIZATION"),
            Self::Internal => write!(f, "INTERNAL"),
        }
    }
}

/// The unified application error used throughout Namecast.
///
/// All crate-specific errors are mapped into `AppError` using `From` impls
/// or explicit `.map_err()` calls.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    /// The category of error.
    pub kind: ErrorKind,
    /// A human-readable error message.
    pub message: String,
    /// Optional underlying cause.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new application error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Create a new application error with an underlying cause.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a missing-field error naming the field.
    pub fn missing_field(field: &str) -> Self {
        Self::new(ErrorKind::MissingField, format!("'{field}' is required"))
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Database, message)
    }

    /// Create a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Storage, message)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }
}

impl Clone for AppError {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            message: self.message.clone(),
            source: None,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(
            ErrorKind::Serialization,
            format!("JSON serialization error: {err}"),
            err,
        )
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(ErrorKind::Storage, format!("I/O error: {err}"), err)
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::with_source(
            ErrorKind::Configuration,
            format!("Configuration error: {err}"),
            err,
        )
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::with_source(
            ErrorKind::Configuration,
            format!("Invalid configuration: {err}"),
            err,
        )
    }
}
