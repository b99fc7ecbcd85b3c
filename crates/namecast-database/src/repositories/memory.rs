//! In-memory record store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use namecast_core::result::AppResult;
use namecast_entity::{MediaKind, RecordedState, Recording};

use super::RecordStore;

/// Record store kept in a concurrent map.
///
/// Each mutation runs while holding the entry's shard lock, which gives
/// the same compare-and-set behavior as the conditional SQL update.
#[derive(Debug, Default)]
pub struct MemoryRecordRepository {
    records: DashMap<i64, Recording>,
}

impl MemoryRecordRepository {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record.
    pub fn insert(&self, recording: Recording) {
        self.records.insert(recording.id, recording);
    }
}

#[async_trait]
impl RecordStore for MemoryRecordRepository {
    fn backend(&self) -> &str {
        "memory"
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }

    async fn find_by_id(&self, id: i64) -> AppResult<Option<Recording>> {
        Ok(self.records.get(&id).map(|r| r.value().clone()))
    }

    async fn ensure(&self, id: i64, name: &str) -> AppResult<Recording> {
        Ok(self
            .records
            .entry(id)
            .or_insert_with(|| Recording::new(id, name))
            .value()
            .clone())
    }

    async fn mark_recorded(
        &self,
        id: i64,
        kind: MediaKind,
        path: &str,
        at: DateTime<Utc>,
        expected: &RecordedState,
    ) -> AppResult<Option<Recording>> {
        let Some(mut record) = self.records.get_mut(&id) else {
            return Ok(None);
        };
        if record.recorded_state(kind) != *expected {
            return Ok(None);
        }
        record.apply_commit(kind, path, at);
        Ok(Some(record.clone()))
    }

    async fn revert_recorded(
        &self,
        id: i64,
        kind: MediaKind,
        committed_path: &str,
        restore: &RecordedState,
    ) -> AppResult<Option<Recording>> {
        let Some(mut record) = self.records.get_mut(&id) else {
            return Ok(None);
        };
        if !record.is_recorded || record.processed_path(kind) != Some(committed_path) {
            return Ok(None);
        }
        record.restore_state(kind, restore);
        Ok(Some(record.clone()))
    }
}
