//! One finalize job, run to a terminal stage.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use namecast_core::error::{AppError, ErrorKind};
use namecast_entity::{JobStage, PublishedAsset, TranscodeJob};
use namecast_media::TranscodeProgress;
use namecast_storage::{UploadSession, WorkDir};

use super::error::FinalizeError;
use super::service::{FinalizeOutcome, Inner};
use crate::record::RecordAttempt;

/// Buffer between the transcoder and the progress forwarder.
const PROGRESS_BUFFER: usize = 32;

/// Decides once whether a job's commit or the finalize deadline came first.
#[derive(Debug, Default)]
pub(super) struct Verdict(AtomicBool);

impl Verdict {
    /// Returns true for the first caller only.
    pub(super) fn settle(&self) -> bool {
        !self.0.swap(true, Ordering::AcqRel)
    }
}

/// What an attempt has written outside its work directory.
#[derive(Debug, Default)]
struct Footprint {
    published: Option<PublishedAsset>,
    committed_path: Option<String>,
}

/// Everything a job needs, owned by the spawned task.
pub(super) struct JobRun {
    pub(super) job: TranscodeJob,
    pub(super) session: UploadSession,
    pub(super) work_dir: WorkDir,
    pub(super) attempt: RecordAttempt,
    pub(super) progress: Option<mpsc::Sender<TranscodeProgress>>,
    pub(super) cancel: CancellationToken,
    pub(super) verdict: Arc<Verdict>,
}

impl Inner {
    /// Run every stage of a job. On failure the attempt's own record change
    /// and objects are undone; the work directory is removed either way.
    #[instrument(
        skip_all,
        fields(job_id = %run.job.job_id, upload_id = %run.job.upload_id, record_id = run.job.record_id)
    )]
    pub(super) async fn run_job(self: Arc<Self>, run: JobRun) -> Result<FinalizeOutcome, FinalizeError> {
        let JobRun {
            mut job,
            session,
            work_dir,
            attempt,
            progress,
            cancel,
            verdict,
        } = run;
        let mut footprint = Footprint::default();

        let result = self
            .run_stages(
                &mut job,
                session,
                &work_dir,
                &attempt,
                progress,
                &cancel,
                &verdict,
                &mut footprint,
            )
            .await;

        if !work_dir.remove().await {
            warn!(work_dir = %work_dir.name(), "Work directory left for the reaper");
        }

        match result {
            Ok(outcome) => {
                info!(manifest = %outcome.asset.manifest_object_key, "Finalize complete");
                Ok(outcome)
            }
            Err(err) => {
                let failed_in = job.stage;
                error!(stage = %failed_in, error = %err, "Finalize failed");
                self.undo(&attempt, footprint).await;
                self.set_stage(&mut job, JobStage::Failed);
                Err(FinalizeError::failed(job.job_id, failed_in, err))
            }
        }
    }

    /// Roll the record back, then delete the attempt's objects once nothing
    /// can reference them.
    async fn undo(&self, attempt: &RecordAttempt, footprint: Footprint) {
        let Footprint {
            published,
            committed_path,
        } = footprint;
        match self.records.rollback(attempt, committed_path.as_deref()).await {
            Ok(_) => {
                if let Some(asset) = published {
                    let removed = self.uploader.unpublish(&asset).await;
                    info!(removed, manifest = %asset.manifest_object_key, "Removed objects of failed attempt");
                }
            }
            Err(e) => match published {
                Some(asset) => error!(
                    error = %e,
                    manifest = %asset.manifest_object_key,
                    "Rollback failed; published objects kept for reconciliation"
                ),
                None => error!(error = %e, "Rollback failed"),
            },
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_stages(
        &self,
        job: &mut TranscodeJob,
        session: UploadSession,
        work_dir: &WorkDir,
        attempt: &RecordAttempt,
        progress: Option<mpsc::Sender<TranscodeProgress>>,
        cancel: &CancellationToken,
        verdict: &Verdict,
        footprint: &mut Footprint,
    ) -> Result<FinalizeOutcome, AppError> {
        let source = self.reassembler.assemble(&session, work_dir.path()).await?;
        drop(session);
        job.source_path = Some(source.clone());
        still_running(cancel, job.stage)?;

        self.set_stage(job, JobStage::Remuxing);
        let remuxed = self.remuxer.remux(&source, cancel).await?;

        self.set_stage(job, JobStage::Transcoding);
        let (tx, rx) = mpsc::channel(PROGRESS_BUFFER);
        let (output, ()) = tokio::join!(
            self.transcoder
                .transcode(&remuxed, work_dir.path(), job.media_kind, Some(tx), cancel),
            self.forward_progress(&job.upload_id, rx, progress),
        );
        let output = output?;
        job.manifest_path = Some(output.manifest_path.clone());
        still_running(cancel, job.stage)?;

        self.set_stage(job, JobStage::Publishing);
        let prefix = PublishedAsset::key_prefix(job.media_kind, job.record_id, job.job_id);
        let asset = self
            .uploader
            .publish(
                &output.manifest_path,
                &output.segment_paths,
                &prefix,
                job.media_kind,
                cancel,
            )
            .await?;
        footprint.published = Some(asset.clone());
        still_running(cancel, job.stage)?;

        self.set_stage(job, JobStage::Committing);
        // Set before the call: a store error leaves the outcome unknown.
        footprint.committed_path = Some(asset.manifest_object_key.clone());
        let commit = self.records.commit(attempt, &asset.manifest_object_key).await?;
        if !commit.is_complete() {
            return Err(AppError::new(
                ErrorKind::CommitFailed,
                format!("Record store confirmed only part of the commit: {commit:?}"),
            ));
        }
        if !verdict.settle() {
            return Err(AppError::new(
                ErrorKind::FinalizeTimedOut,
                "Finalize deadline passed while committing",
            ));
        }

        self.set_stage(job, JobStage::Done);
        Ok(FinalizeOutcome {
            job_id: job.job_id,
            record_id: job.record_id,
            asset,
            commit,
        })
    }

    /// Copy transcode samples into the job status and on to the caller.
    async fn forward_progress(
        &self,
        upload_id: &str,
        mut rx: mpsc::Receiver<TranscodeProgress>,
        caller: Option<mpsc::Sender<TranscodeProgress>>,
    ) {
        while let Some(sample) = rx.recv().await {
            if let Some(mut slot) = self.jobs.get_mut(upload_id) {
                if let Some(status) = slot.as_mut() {
                    status.progress = Some(sample);
                }
            }
            if let Some(tx) = &caller {
                let _ = tx.try_send(sample);
            }
        }
    }

    fn set_stage(&self, job: &mut TranscodeJob, stage: JobStage) {
        job.stage = stage;
        if let Some(mut slot) = self.jobs.get_mut(&job.upload_id) {
            if let Some(status) = slot.as_mut() {
                status.stage = stage;
            }
        }
    }
}

fn still_running(cancel: &CancellationToken, stage: JobStage) -> Result<(), AppError> {
    if cancel.is_cancelled() {
        return Err(AppError::new(
            ErrorKind::FinalizeTimedOut,
            format!("Finalize cancelled after {stage}"),
        ));
    }
    Ok(())
}
