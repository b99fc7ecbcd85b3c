//! Chunk receipt and finalize configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Settings for the chunk store and the finalize request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct IngestConfig {
    /// Per-chunk size ceiling in bytes (default 5 MB).
    #[serde(default = "default_max_chunk_bytes")]
    #[validate(range(min = 1))]
    pub max_chunk_bytes: usize,
    /// Largest `total_chunks` a session may declare.
    #[serde(default = "default_max_total_chunks")]
    #[validate(range(min = 1))]
    pub max_total_chunks: u32,
    /// Sessions untouched for longer than this are swept.
    #[serde(default = "default_session_stale_seconds")]
    #[validate(range(min = 1))]
    pub session_stale_seconds: u64,
    /// Interval between stale-session sweeps.
    #[serde(default = "default_session_sweep_interval")]
    #[validate(range(min = 1))]
    pub session_sweep_interval_seconds: u64,
    /// Wall-clock budget for one finalize request.
    #[serde(default = "default_finalize_timeout")]
    #[validate(range(min = 1))]
    pub finalize_timeout_seconds: u64,
}

impl IngestConfig {
    /// Staleness threshold as a [`Duration`].
    pub fn session_stale_after(&self) -> Duration {
        Duration::from_secs(self.session_stale_seconds)
    }

    /// Sweep interval as a [`Duration`].
    pub fn session_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.session_sweep_interval_seconds)
    }

    /// Finalize budget as a [`Duration`].
    pub fn finalize_timeout(&self) -> Duration {
        Duration::from_secs(self.finalize_timeout_seconds)
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_chunk_bytes: default_max_chunk_bytes(),
            max_total_chunks: default_max_total_chunks(),
            session_stale_seconds: default_session_stale_seconds(),
            session_sweep_interval_seconds: default_session_sweep_interval(),
            finalize_timeout_seconds: default_finalize_timeout(),
        }
    }
}

fn default_max_chunk_bytes() -> usize {
    5_242_880 // 5 MB
}

fn default_max_total_chunks() -> u32 {
    10_000
}

fn default_session_stale_seconds() -> u64 {
    3600
}

fn default_session_sweep_interval() -> u64 {
    300
}

fn default_finalize_timeout() -> u64 {
    600
}
