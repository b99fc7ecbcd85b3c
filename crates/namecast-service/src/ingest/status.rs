//! Status snapshots.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use namecast_entity::{JobStage, MediaKind};
use namecast_media::TranscodeProgress;

/// Live state of one finalize job.
#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    /// Job identifier.
    pub job_id: Uuid,
    /// Upload being finalized.
    pub upload_id: String,
    /// Record the job commits into.
    pub record_id: i64,
    /// Kind of media produced.
    pub media_kind: MediaKind,
    /// Current stage.
    pub stage: JobStage,
    /// When the job started.
    pub started_at: DateTime<Utc>,
    /// Most recent transcode progress sample.
    pub progress: Option<TranscodeProgress>,
}

/// Reachability of a backing store.
#[derive(Debug, Clone, Serialize)]
pub struct StoreHealth {
    /// Backend name.
    pub backend: String,
    /// Whether the health check passed.
    pub healthy: bool,
}

/// Snapshot of the whole ingest service.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    /// Upload sessions currently receiving chunks.
    pub open_sessions: usize,
    /// Finalize jobs in flight.
    pub active_jobs: Vec<JobStatus>,
    /// Object storage backend.
    pub object_store: StoreHealth,
    /// Record store backend.
    pub record_store: StoreHealth,
}
