//! Database migration runner.

use sqlx::PgPool;
use tracing::info;

use namecast_core::error::{AppError, ErrorKind};

/// Run all pending migrations under `migrations/`.
pub async fn run_migrations(pool: &PgPool) -> Result<(), AppError> {
    info!("Running record store migrations");

    sqlx::migrate!("../../migrations")
        .run(pool)
        .await
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::Database,
                format!("Failed to run migrations: {e}"),
                e,
            )
        })?;

    info!("Record store migrations applied");
    Ok(())
}
