//! Transcode job entity.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::stage::JobStage;
use crate::recording::MediaKind;

/// One attempt to turn a reassembled upload into a published asset.
///
/// `work_dir` exists before anything is written into it and is removed as
/// a unit when the job reaches a terminal stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscodeJob {
    /// Unique job identifier.
    pub job_id: Uuid,
    /// Upload the job was created from.
    pub upload_id: String,
    /// Record the job will commit into.
    pub record_id: i64,
    /// Kind of media being produced.
    pub media_kind: MediaKind,
    /// Reassembled source file inside `work_dir`.
    pub source_path: Option<PathBuf>,
    /// Job-scoped scratch directory.
    pub work_dir: PathBuf,
    /// Manifest produced by the transcoder.
    pub manifest_path: Option<PathBuf>,
    /// Current stage.
    pub stage: JobStage,
    /// When the job was created.
    pub created_at: DateTime<Utc>,
}

impl TranscodeJob {
    /// Create a job in the reassembling stage.
    pub fn new(upload_id: &str, record_id: i64, media_kind: MediaKind, work_dir: PathBuf) -> Self {
        Self {
            job_id: Uuid::now_v7(),
            upload_id: upload_id.to_string(),
            record_id,
            media_kind,
            source_path: None,
            work_dir,
            manifest_path: None,
            stage: JobStage::Reassembling,
            created_at: Utc::now(),
        }
    }
}
