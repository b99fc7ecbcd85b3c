//! Object upload configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Settings for pushing a transcoded asset to object storage.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PublishConfig {
    /// Maximum concurrent segment uploads.
    #[serde(default = "default_concurrency")]
    #[validate(range(min = 1, max = 64))]
    pub concurrency: usize,
    /// Attempts per object before the publish fails.
    #[serde(default = "default_max_attempts")]
    #[validate(range(min = 1, max = 10))]
    pub max_attempts: u32,
    /// Fixed delay between attempts in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Lifetime of presigned playback URLs.
    #[serde(default = "default_presign_expiry")]
    #[validate(range(min = 1))]
    pub presign_expiry_seconds: u64,
}

impl PublishConfig {
    /// Retry delay as a [`Duration`].
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Presigned URL lifetime as a [`Duration`].
    pub fn presign_expiry(&self) -> Duration {
        Duration::from_secs(self.presign_expiry_seconds)
    }
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            presign_expiry_seconds: default_presign_expiry(),
        }
    }
}

fn default_concurrency() -> usize {
    5
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_presign_expiry() -> u64 {
    3600
}
