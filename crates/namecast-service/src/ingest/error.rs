//! Finalize failures and their caller-facing form.

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use namecast_core::error::{AppError, ErrorKind};
use namecast_entity::JobStage;

/// A failed finalize request.
///
/// Requests rejected before a job exists carry neither job id nor stage.
#[derive(Debug, Error)]
#[error("{}", describe(.job_id, .stage, .source))]
pub struct FinalizeError {
    /// Job that failed.
    pub job_id: Option<Uuid>,
    /// Stage the job was in.
    pub stage: Option<JobStage>,
    /// Underlying error.
    #[source]
    pub source: AppError,
}

fn describe(job_id: &Option<Uuid>, stage: &Option<JobStage>, source: &AppError) -> String {
    match (job_id, stage) {
        (Some(id), Some(stage)) => format!("job {id} failed during {stage}: {source}"),
        (Some(id), None) => format!("job {id} failed: {source}"),
        _ => source.to_string(),
    }
}

impl FinalizeError {
    /// A request rejected before any job started.
    pub fn rejected(source: AppError) -> Self {
        Self {
            job_id: None,
            stage: None,
            source,
        }
    }

    /// A job that failed in `stage`.
    pub fn failed(job_id: Uuid, stage: JobStage, source: AppError) -> Self {
        Self {
            job_id: Some(job_id),
            stage: Some(stage),
            source,
        }
    }

    /// Machine-readable kind.
    pub fn kind(&self) -> ErrorKind {
        self.source.kind
    }

    /// Serializable form for the transport layer.
    pub fn payload(&self) -> ErrorPayload {
        ErrorPayload {
            kind: self.source.kind,
            message: self.source.message.clone(),
            job_id: self.job_id,
            stage: self.stage,
        }
    }
}

/// Structured error returned to callers of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorPayload {
    /// Machine-readable kind.
    pub kind: ErrorKind,
    /// Human-readable message.
    pub message: String,
    /// Job the error belongs to, if one was started.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<Uuid>,
    /// Stage the job failed in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<JobStage>,
}

impl From<&AppError> for ErrorPayload {
    fn from(err: &AppError) -> Self {
        Self {
            kind: err.kind,
            message: err.message.clone(),
            job_id: None,
            stage: None,
        }
    }
}
