//! Ingest service: the pipeline's three operations.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use namecast_core::config::AppConfig;
use namecast_core::error::{AppError, ErrorKind};
use namecast_core::result::AppResult;
use namecast_core::traits::ObjectStore;
use namecast_database::RecordStore;
use namecast_entity::{JobStage, MediaKind, PublishedAsset, TranscodeJob};
use namecast_media::{Remuxer, TranscodeProgress, Transcoder};
use namecast_storage::{
    ActiveWorkDirs, ChunkReceipt, ChunkStore, IncomingChunk, Reassembler, ScratchSpace,
};

use super::error::FinalizeError;
use super::job::{JobRun, Verdict};
use super::status::{JobStatus, ServiceStatus, StoreHealth};
use crate::publish::PublishUploader;
use crate::record::{CommitReport, RecordStateCoordinator};

/// Finalize an upload into a published asset of `media_kind`.
#[derive(Debug, Clone)]
pub struct FinalizeRequest {
    /// Upload whose chunks are complete.
    pub upload_id: String,
    /// Kind of media to produce.
    pub media_kind: MediaKind,
}

/// A successful finalize.
#[derive(Debug, Clone, Serialize)]
pub struct FinalizeOutcome {
    /// Job that ran.
    pub job_id: Uuid,
    /// Record now pointing at the asset.
    pub record_id: i64,
    /// Published objects.
    pub asset: PublishedAsset,
    /// Fields confirmed by the record store.
    pub commit: CommitReport,
}

/// Shared state behind [`IngestService`].
pub(super) struct Inner {
    pub(super) chunks: Arc<ChunkStore>,
    pub(super) scratch: ScratchSpace,
    pub(super) reassembler: Reassembler,
    pub(super) remuxer: Remuxer,
    pub(super) transcoder: Transcoder,
    pub(super) uploader: PublishUploader,
    pub(super) records: RecordStateCoordinator,
    pub(super) object_store: Arc<dyn ObjectStore>,
    /// One entry per upload with a finalize in flight. `None` while the
    /// request is claimed but no job has started yet.
    pub(super) jobs: DashMap<String, Option<JobStatus>>,
    finalize_timeout: Duration,
    presign_expiry: Duration,
}

/// Removes the in-flight marker for an upload when dropped.
struct InFlight {
    inner: Arc<Inner>,
    upload_id: String,
}

impl InFlight {
    fn claim(inner: &Arc<Inner>, upload_id: &str) -> Result<Self, FinalizeError> {
        match inner.jobs.entry(upload_id.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(FinalizeError::rejected(AppError::new(
                    ErrorKind::FinalizeInProgress,
                    format!("A finalize for upload '{upload_id}' is already running"),
                )))
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(None);
                Ok(Self {
                    inner: inner.clone(),
                    upload_id: upload_id.to_string(),
                })
            }
        }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.inner.jobs.remove(&self.upload_id);
    }
}

/// Entry point for the transport layer: receive chunks, finalize uploads,
/// report status.
#[derive(Clone)]
pub struct IngestService {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for IngestService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestService")
            .field("open_sessions", &self.inner.chunks.session_count())
            .field("active_jobs", &self.inner.jobs.len())
            .finish()
    }
}

impl IngestService {
    /// Build the service and its pipeline stages from configuration.
    pub fn new(
        config: &AppConfig,
        object_store: Arc<dyn ObjectStore>,
        record_store: Arc<dyn RecordStore>,
    ) -> Self {
        let scratch = ScratchSpace::new(
            config.scratch.root_path(),
            config.scratch.prefix.clone(),
            ActiveWorkDirs::new(),
        );
        Self {
            inner: Arc::new(Inner {
                chunks: Arc::new(
                    ChunkStore::new(config.ingest.max_chunk_bytes)
                        .with_max_total_chunks(config.ingest.max_total_chunks),
                ),
                scratch,
                reassembler: Reassembler::new(),
                remuxer: Remuxer::new(&config.media),
                transcoder: Transcoder::new(&config.media),
                uploader: PublishUploader::from_config(object_store.clone(), &config.publish),
                records: RecordStateCoordinator::new(record_store),
                object_store,
                jobs: DashMap::new(),
                finalize_timeout: config.ingest.finalize_timeout(),
                presign_expiry: config.publish.presign_expiry(),
            }),
        }
    }

    /// Chunk store, shared with the stale-session sweeper.
    pub fn chunk_store(&self) -> Arc<ChunkStore> {
        self.inner.chunks.clone()
    }

    /// Scratch space, shared with the scratch reaper.
    pub fn scratch(&self) -> &ScratchSpace {
        &self.inner.scratch
    }

    /// Record state coordinator.
    pub fn records(&self) -> &RecordStateCoordinator {
        &self.inner.records
    }

    /// Prepare the scratch root and the bucket.
    pub async fn bootstrap(&self) -> AppResult<()> {
        let root = self.inner.scratch.root();
        tokio::fs::create_dir_all(root).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create scratch root {}", root.display()),
                e,
            )
        })?;

        let store = &self.inner.object_store;
        if !store.bucket_exists().await? {
            info!(bucket = store.bucket(), provider = store.provider_type(), "Creating bucket");
            store.create_bucket().await?;
        }
        Ok(())
    }

    /// Accept one chunk of an upload.
    pub fn receive_chunk(&self, chunk: IncomingChunk) -> AppResult<ChunkReceipt> {
        if self.inner.jobs.contains_key(&chunk.upload_id) {
            return Err(AppError::new(
                ErrorKind::FinalizeInProgress,
                format!("Upload '{}' is being finalized", chunk.upload_id),
            ));
        }
        let upload_id = chunk.upload_id.clone();
        let index = chunk.chunk_index;
        let receipt = self.inner.chunks.receive(chunk)?;
        debug!(
            %upload_id,
            chunk_index = index,
            received = receipt.received_count,
            total = receipt.total_chunks,
            "Chunk received"
        );
        Ok(receipt)
    }

    /// Drop an upload's chunks without finalizing it.
    pub fn discard_upload(&self, upload_id: &str) -> bool {
        self.inner.chunks.discard(upload_id)
    }

    /// Finalize an upload.
    pub async fn finalize(&self, request: FinalizeRequest) -> Result<FinalizeOutcome, FinalizeError> {
        self.finalize_with_progress(request, None).await
    }

    /// Finalize an upload, sending transcode progress to `progress`.
    ///
    /// Returns within the configured finalize timeout. When it expires the
    /// job is cancelled and `FinalizeTimedOut` is returned right away; the
    /// job finishes its rollback and cleanup in the background.
    pub async fn finalize_with_progress(
        &self,
        request: FinalizeRequest,
        progress: Option<mpsc::Sender<TranscodeProgress>>,
    ) -> Result<FinalizeOutcome, FinalizeError> {
        let FinalizeRequest {
            upload_id,
            media_kind,
        } = request;
        if upload_id.trim().is_empty() {
            return Err(FinalizeError::rejected(AppError::missing_field("upload_id")));
        }

        let in_flight = InFlight::claim(&self.inner, &upload_id)?;

        let session = self.inner.chunks.take_completed(&upload_id).map_err(|e| {
            warn!(%upload_id, error = %e, "Finalize rejected");
            FinalizeError::rejected(e)
        })?;

        let record_id = session.owner_record_id();
        let attempt = match self.inner.records.begin_attempt(record_id, media_kind).await {
            Ok(attempt) => attempt,
            Err(e) => {
                self.inner.chunks.restore(session);
                return Err(FinalizeError::rejected(e));
            }
        };

        let work_dir = match self.inner.scratch.create_work_dir(&upload_id).await {
            Ok(dir) => dir,
            Err(e) => {
                self.inner.chunks.restore(session);
                return Err(FinalizeError::rejected(e));
            }
        };

        let job = TranscodeJob::new(&upload_id, record_id, media_kind, work_dir.path().to_path_buf());
        let job_id = job.job_id;
        if let Some(mut slot) = self.inner.jobs.get_mut(&upload_id) {
            *slot = Some(JobStatus {
                job_id,
                upload_id: upload_id.clone(),
                record_id,
                media_kind,
                stage: job.stage,
                started_at: job.created_at,
                progress: None,
            });
        }
        info!(%upload_id, %job_id, record_id, %media_kind, work_dir = %work_dir.name(), "Finalize started");

        let cancel = CancellationToken::new();
        let verdict = Arc::new(Verdict::default());
        let run = JobRun {
            job,
            session,
            work_dir,
            attempt,
            progress,
            cancel: cancel.clone(),
            verdict: verdict.clone(),
        };
        let inner = self.inner.clone();
        let mut handle = tokio::spawn(async move {
            let _in_flight = in_flight;
            inner.run_job(run).await
        });

        let joined = match tokio::time::timeout(self.inner.finalize_timeout, &mut handle).await {
            Ok(joined) => joined,
            Err(_) if verdict.settle() => {
                cancel.cancel();
                let stage = self
                    .job_status(&upload_id)
                    .map(|s| s.stage)
                    .unwrap_or(JobStage::Failed);
                warn!(
                    %upload_id,
                    %job_id,
                    %stage,
                    timeout_s = self.inner.finalize_timeout.as_secs(),
                    "Finalize timed out, cancelling job"
                );
                return Err(FinalizeError::failed(
                    job_id,
                    stage,
                    AppError::new(
                        ErrorKind::FinalizeTimedOut,
                        format!(
                            "Finalize did not finish within {}s",
                            self.inner.finalize_timeout.as_secs()
                        ),
                    ),
                ));
            }
            Err(_) => {
                // The job committed first; its result is moments away.
                debug!(%upload_id, %job_id, "Deadline passed after commit, waiting for the job");
                handle.await
            }
        };

        joined.unwrap_or_else(|join_error| {
            Err(FinalizeError::failed(
                job_id,
                JobStage::Failed,
                AppError::internal(format!("Finalize task aborted: {join_error}")),
            ))
        })
    }

    /// State of the finalize job for an upload, if one is running.
    pub fn job_status(&self, upload_id: &str) -> Option<JobStatus> {
        self.inner.jobs.get(upload_id).and_then(|s| s.value().clone())
    }

    /// Snapshot of sessions, jobs and backend health.
    pub async fn status(&self) -> ServiceStatus {
        let mut active_jobs: Vec<JobStatus> = self
            .inner
            .jobs
            .iter()
            .filter_map(|e| e.value().clone())
            .collect();
        active_jobs.sort_by_key(|j| j.started_at);

        let store = &self.inner.object_store;
        let records = self.inner.records.store();
        ServiceStatus {
            open_sessions: self.inner.chunks.session_count(),
            active_jobs,
            object_store: StoreHealth {
                backend: format!("{} ({})", store.provider_type(), store.bucket()),
                healthy: store.health_check().await.unwrap_or(false),
            },
            record_store: StoreHealth {
                backend: records.backend().to_string(),
                healthy: records.health_check().await.unwrap_or(false),
            },
        }
    }

    /// Time-limited URL for playing an asset's manifest.
    pub async fn playback_url(&self, asset: &PublishedAsset) -> AppResult<String> {
        self.inner
            .object_store
            .presigned_url(&asset.manifest_object_key, self.inner.presign_expiry)
            .await
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use namecast_database::MemoryRecordRepository;
    use namecast_entity::Recording;
    use namecast_storage::providers::MemoryObjectStore;

    use super::*;

    fn service(scratch: &std::path::Path) -> IngestService {
        let mut config = AppConfig::default();
        config.scratch.root = scratch.display().to_string();
        let records = Arc::new(MemoryRecordRepository::new());
        records.insert(Recording::new(42, "Ada"));
        IngestService::new(
            &config,
            Arc::new(MemoryObjectStore::new("recordings")),
            records,
        )
    }

    fn chunk(upload_id: &str, index: u32, total: u32, owner: i64) -> IncomingChunk {
        IncomingChunk {
            upload_id: upload_id.to_string(),
            chunk_index: index,
            total_chunks: total,
            data: Bytes::from_static(b"chunk"),
            owner_record_id: owner,
            file_name: "take.webm".to_string(),
        }
    }

    fn request(upload_id: &str) -> FinalizeRequest {
        FinalizeRequest {
            upload_id: upload_id.to_string(),
            media_kind: MediaKind::Video,
        }
    }

    #[tokio::test]
    async fn test_finalize_rejects_blank_and_unknown_uploads() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path());

        let err = svc.finalize(request("  ")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingField);
        assert!(err.job_id.is_none());

        let err = svc.finalize(request("nope")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownUploadSession);
        assert!(svc.job_status("nope").is_none());
    }

    #[tokio::test]
    async fn test_incomplete_upload_stays_open() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path());
        svc.receive_chunk(chunk("abc", 0, 2, 42)).unwrap();

        let err = svc.finalize(request("abc")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IncompleteSession);

        let receipt = svc.receive_chunk(chunk("abc", 1, 2, 42)).unwrap();
        assert!(receipt.is_complete);
    }

    #[tokio::test]
    async fn test_missing_record_restores_session() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path());
        svc.receive_chunk(chunk("orphan", 0, 1, 7)).unwrap();

        let err = svc.finalize(request("orphan")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(svc.chunk_store().session_count(), 1);
        assert!(svc.scratch().active().is_empty());
    }

    #[tokio::test]
    async fn test_discard_and_status() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path());
        svc.receive_chunk(chunk("abc", 0, 3, 42)).unwrap();

        let status = svc.status().await;
        assert_eq!(status.open_sessions, 1);
        assert!(status.active_jobs.is_empty());
        assert!(status.object_store.healthy);
        assert!(status.record_store.healthy);

        assert!(svc.discard_upload("abc"));
        assert!(!svc.discard_upload("abc"));
        assert_eq!(svc.status().await.open_sessions, 0);
    }

    #[tokio::test]
    async fn test_bootstrap_creates_scratch_root_and_bucket() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("scratch");
        let svc = service(&root);
        svc.bootstrap().await.unwrap();
        assert!(root.is_dir());
    }
}
