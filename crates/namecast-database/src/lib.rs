//! # namecast-database
//!
//! PostgreSQL connection management, migrations and the record store
//! used by the ingest pipeline. An in-memory store stands in when no
//! database URL is configured.

pub mod connection;
pub mod migration;
pub mod repositories;

use std::sync::Arc;

use tracing::info;

use namecast_core::config::DatabaseConfig;
use namecast_core::result::AppResult;

pub use connection::{DatabasePool, mask_password};
pub use repositories::{MemoryRecordRepository, PgRecordRepository, RecordStore};

/// Build the record store selected by configuration.
///
/// A configured URL connects to PostgreSQL and applies pending
/// migrations; an empty URL yields an in-memory store.
pub async fn connect_record_store(config: &DatabaseConfig) -> AppResult<Arc<dyn RecordStore>> {
    if !config.is_configured() {
        info!("No database URL configured, using in-memory record store");
        return Ok(Arc::new(MemoryRecordRepository::new()));
    }

    let db = DatabasePool::connect(config).await?;
    migration::run_migrations(db.pool()).await?;
    Ok(Arc::new(PgRecordRepository::new(db.into_pool())))
}
