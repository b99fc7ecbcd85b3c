//! The only writer of a record's recorded state.

use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use namecast_core::error::{AppError, ErrorKind};
use namecast_core::result::AppResult;
use namecast_database::RecordStore;
use namecast_entity::{MediaKind, RecordedState};

/// Snapshot taken when a pipeline attempt starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordAttempt {
    /// Record the attempt targets.
    pub record_id: i64,
    /// Media kind the attempt produces.
    pub media_kind: MediaKind,
    /// The record's state for `media_kind` when the attempt began.
    pub before: RecordedState,
}

impl RecordAttempt {
    /// `is_recorded` when the attempt began.
    pub fn was_recorded(&self) -> bool {
        self.before.is_recorded
    }
}

/// Which parts of a commit the record store confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CommitReport {
    /// Commit time written to the record.
    pub committed_at: DateTime<Utc>,
    /// `is_recorded` reads back as true.
    pub is_recorded: bool,
    /// `recorded_at` reads back as the commit time.
    pub recorded_at: bool,
    /// The processed path for the media kind reads back as the manifest key.
    pub processed_path: bool,
}

impl CommitReport {
    /// Whether every field was confirmed.
    pub fn is_complete(&self) -> bool {
        self.is_recorded && self.recorded_at && self.processed_path
    }
}

/// What a rollback did to the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackOutcome {
    /// The attempt never wrote the record; it keeps its current state.
    Untouched,
    /// The attempt's commit was replaced by the pre-attempt state.
    Reverted,
    /// The record is gone or holds another attempt's commit; left alone.
    NotOwned,
}

/// Moves a record between unrecorded and recorded.
///
/// A record only becomes recorded through [`commit`](Self::commit), which
/// is a compare-and-set on the state seen by [`begin_attempt`](Self::begin_attempt).
/// [`rollback`](Self::rollback) is the recovery step for every failure and
/// only ever undoes the failing attempt's own commit.
#[derive(Debug, Clone)]
pub struct RecordStateCoordinator {
    store: Arc<dyn RecordStore>,
}

impl RecordStateCoordinator {
    /// Create a coordinator over a record store.
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Start an attempt. Reads the record; changes nothing.
    pub async fn begin_attempt(&self, record_id: i64, kind: MediaKind) -> AppResult<RecordAttempt> {
        let record = self
            .store
            .find_by_id(record_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Recording {record_id} not found")))?;
        Ok(RecordAttempt {
            record_id,
            media_kind: kind,
            before: record.recorded_state(kind),
        })
    }

    /// Mark the record recorded with `path` as its processed path.
    ///
    /// Fails with `CommitFailed` when the record vanished or its state moved
    /// since [`begin_attempt`](Self::begin_attempt). Otherwise returns which
    /// fields the store confirmed.
    pub async fn commit(&self, attempt: &RecordAttempt, path: &str) -> AppResult<CommitReport> {
        let kind = attempt.media_kind;
        // Microsecond precision so the read-back compares equal on PostgreSQL.
        let at = Utc::now().trunc_subsecs(6);
        let updated = self
            .store
            .mark_recorded(attempt.record_id, kind, path, at, &attempt.before)
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::CommitFailed,
                    format!("Record store rejected commit for recording {}", attempt.record_id),
                    e,
                )
            })?;

        let Some(record) = updated else {
            return Err(AppError::new(
                ErrorKind::CommitFailed,
                format!(
                    "Recording {} is missing or changed state during the attempt",
                    attempt.record_id
                ),
            ));
        };

        let report = CommitReport {
            committed_at: at,
            is_recorded: record.is_recorded,
            recorded_at: record.recorded_at == Some(at),
            processed_path: record.processed_path(kind) == Some(path),
        };
        if report.is_complete() {
            info!(record_id = attempt.record_id, %kind, path, "Recording committed");
        } else {
            error!(record_id = attempt.record_id, ?report, "Commit was only partially applied");
        }
        Ok(report)
    }

    /// Undo whatever `attempt` did to its record.
    ///
    /// `committed_path` is the manifest key the attempt tried to commit, if
    /// it got that far. The pre-attempt state is put back only while the
    /// record still holds that key, so a concurrent attempt's commit is
    /// never wiped. Safe to repeat.
    pub async fn rollback(
        &self,
        attempt: &RecordAttempt,
        committed_path: Option<&str>,
    ) -> AppResult<RollbackOutcome> {
        let record_id = attempt.record_id;
        let kind = attempt.media_kind;
        let Some(path) = committed_path else {
            info!(
                record_id,
                %kind,
                is_recorded = attempt.was_recorded(),
                "Recording left at its pre-attempt state"
            );
            return Ok(RollbackOutcome::Untouched);
        };

        match self
            .store
            .revert_recorded(record_id, kind, path, &attempt.before)
            .await?
        {
            Some(_) => {
                info!(
                    record_id,
                    %kind,
                    is_recorded = attempt.was_recorded(),
                    "Recording rolled back to its pre-attempt state"
                );
                Ok(RollbackOutcome::Reverted)
            }
            None => {
                warn!(record_id, %kind, path, "Recording does not hold this attempt's commit");
                Ok(RollbackOutcome::NotOwned)
            }
        }
    }
}
