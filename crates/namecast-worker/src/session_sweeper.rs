//! Removal of upload sessions that stopped receiving chunks.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use namecast_core::error::AppError;
use namecast_storage::ChunkStore;

use crate::tasks::PeriodicTask;

/// Drops sessions idle for longer than `stale_after`.
///
/// A dropped incomplete session is lost; the client has to start the
/// upload again.
#[derive(Debug)]
pub struct SessionSweeper {
    chunks: Arc<ChunkStore>,
    stale_after: Duration,
}

impl SessionSweeper {
    /// Create a sweeper over a chunk store.
    pub fn new(chunks: Arc<ChunkStore>, stale_after: Duration) -> Self {
        Self {
            chunks,
            stale_after,
        }
    }
}

#[async_trait]
impl PeriodicTask for SessionSweeper {
    fn name(&self) -> &'static str {
        "session_sweeper"
    }

    async fn run_once(&self) -> Result<u64, AppError> {
        let removed = self.chunks.sweep_stale(self.stale_after);
        if removed > 0 {
            info!(removed, "Swept stale upload sessions");
        }
        Ok(removed as u64)
    }
}
