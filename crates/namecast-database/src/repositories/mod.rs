//! Record store trait and its implementations.

pub mod memory;
pub mod postgres;

use std::fmt::Debug;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use namecast_core::result::AppResult;
use namecast_entity::{MediaKind, RecordedState, Recording};

pub use memory::MemoryRecordRepository;
pub use postgres::PgRecordRepository;

/// Read and conditional-write access to [`Recording`] rows.
///
/// The two mutating methods are the only way the pipeline changes a
/// record. Both are single atomic statements against the backing store.
#[async_trait]
pub trait RecordStore: Send + Sync + Debug + 'static {
    /// Backend name for status output.
    fn backend(&self) -> &str;

    /// Check whether the store is reachable.
    async fn health_check(&self) -> AppResult<bool>;

    /// Find a record by id.
    async fn find_by_id(&self, id: i64) -> AppResult<Option<Recording>>;

    /// Return the record with `id`, creating an unrecorded one named
    /// `name` if it does not exist yet.
    async fn ensure(&self, id: i64, name: &str) -> AppResult<Recording>;

    /// Flip a record to recorded, but only while its recorded state for
    /// `kind` still equals `expected`.
    ///
    /// Returns the updated row, or `None` when the record is missing or its
    /// state moved under the caller.
    async fn mark_recorded(
        &self,
        id: i64,
        kind: MediaKind,
        path: &str,
        at: DateTime<Utc>,
        expected: &RecordedState,
    ) -> AppResult<Option<Recording>>;

    /// Put `restore` back, but only while the record is recorded with
    /// `committed_path` as its path for `kind`.
    ///
    /// Returns the updated row, or `None` when the record is missing or no
    /// longer holds that commit.
    async fn revert_recorded(
        &self,
        id: i64,
        kind: MediaKind,
        committed_path: &str,
        restore: &RecordedState,
    ) -> AppResult<Option<Recording>>;
}
