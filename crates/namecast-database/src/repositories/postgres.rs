//! PostgreSQL record store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use namecast_core::error::{AppError, ErrorKind};
use namecast_core::result::AppResult;
use namecast_entity::{MediaKind, RecordedState, Recording};

use super::RecordStore;

const RECORDING_COLUMNS: &str =
    "id, name, is_recorded, recorded_at, processed_audio_path, processed_video_path";

/// Record store backed by the `recordings` table.
#[derive(Debug, Clone)]
pub struct PgRecordRepository {
    pool: PgPool,
}

impl PgRecordRepository {
    /// Create a new repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for PgRecordRepository {
    fn backend(&self) -> &str {
        "postgres"
    }

    async fn health_check(&self) -> AppResult<bool> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|v| v == 1)
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Health check failed", e))
    }

    async fn find_by_id(&self, id: i64) -> AppResult<Option<Recording>> {
        sqlx::query_as::<_, Recording>(&format!(
            "SELECT {RECORDING_COLUMNS} FROM recordings WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find recording", e))
    }

    async fn ensure(&self, id: i64, name: &str) -> AppResult<Recording> {
        // The no-op update makes RETURNING yield the existing row on conflict.
        sqlx::query_as::<_, Recording>(&format!(
            "INSERT INTO recordings (id, name) VALUES ($1, $2) \
             ON CONFLICT (id) DO UPDATE SET name = recordings.name \
             RETURNING {RECORDING_COLUMNS}"
        ))
        .bind(id)
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to ensure recording", e))
    }

    async fn mark_recorded(
        &self,
        id: i64,
        kind: MediaKind,
        path: &str,
        at: DateTime<Utc>,
        expected: &RecordedState,
    ) -> AppResult<Option<Recording>> {
        let column = kind.path_column();
        sqlx::query_as::<_, Recording>(&format!(
            "UPDATE recordings SET is_recorded = TRUE, recorded_at = $5, {column} = $6, \
             updated_at = NOW() \
             WHERE id = $1 AND is_recorded = $2 \
             AND recorded_at IS NOT DISTINCT FROM $3 \
             AND {column} IS NOT DISTINCT FROM $4 \
             RETURNING {RECORDING_COLUMNS}"
        ))
        .bind(id)
        .bind(expected.is_recorded)
        .bind(expected.recorded_at)
        .bind(expected.processed_path.as_deref())
        .bind(at)
        .bind(path)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to commit recording", e))
    }

    async fn revert_recorded(
        &self,
        id: i64,
        kind: MediaKind,
        committed_path: &str,
        restore: &RecordedState,
    ) -> AppResult<Option<Recording>> {
        let column = kind.path_column();
        sqlx::query_as::<_, Recording>(&format!(
            "UPDATE recordings SET is_recorded = $3, recorded_at = $4, {column} = $5, \
             updated_at = NOW() \
             WHERE id = $1 AND is_recorded = TRUE AND {column} = $2 \
             RETURNING {RECORDING_COLUMNS}"
        ))
        .bind(id)
        .bind(committed_path)
        .bind(restore.is_recorded)
        .bind(restore.recorded_at)
        .bind(restore.processed_path.as_deref())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to roll back recording", e))
    }
}
