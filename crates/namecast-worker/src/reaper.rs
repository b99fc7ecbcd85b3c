//! Removal of orphaned job scratch directories.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use namecast_core::error::{AppError, ErrorKind};
use namecast_storage::ScratchSpace;

use crate::tasks::PeriodicTask;

/// Counts from one reaper pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReapReport {
    /// Directories following the naming convention.
    pub candidates: u64,
    /// Directories deleted.
    pub removed: u64,
    /// Old directories kept because a job still owns them.
    pub skipped_active: u64,
    /// Directories that could not be deleted.
    pub failed: u64,
}

/// Deletes scratch directories older than `max_age`.
///
/// Only immediate subdirectories of the root whose names carry the scratch
/// prefix are considered. Directories registered as active are never
/// deleted, whatever their age.
#[derive(Debug, Clone)]
pub struct ScratchReaper {
    scratch: ScratchSpace,
    max_age: Duration,
}

impl ScratchReaper {
    /// Create a reaper for a scratch space.
    pub fn new(scratch: ScratchSpace, max_age: Duration) -> Self {
        Self { scratch, max_age }
    }

    /// Sweep the configured root with the configured age.
    pub async fn sweep_now(&self) -> Result<ReapReport, AppError> {
        self.sweep(self.scratch.root(), self.max_age).await
    }

    /// Delete every qualifying directory under `root` last modified more
    /// than `max_age` ago.
    pub async fn sweep(&self, root: &Path, max_age: Duration) -> Result<ReapReport, AppError> {
        let mut report = ReapReport::default();

        let mut entries = match tokio::fs::read_dir(root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(root = %root.display(), "Scratch root does not exist yet");
                return Ok(report);
            }
            Err(e) => {
                return Err(AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to read scratch root {}", root.display()),
                    e,
                ));
            }
        };

        let max_age = chrono::Duration::from_std(max_age)
            .map_err(|e| AppError::configuration(format!("Scratch max age out of range: {e}")))?;
        let cutoff = Utc::now() - max_age;

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if !self.scratch.owns_name(name) {
                continue;
            }
            let Ok(metadata) = entry.metadata().await else {
                continue;
            };
            if !metadata.is_dir() {
                continue;
            }
            report.candidates += 1;

            let Ok(modified) = metadata.modified() else {
                continue;
            };
            let modified: DateTime<Utc> = modified.into();
            if modified >= cutoff {
                continue;
            }

            if self.scratch.active().contains(name) {
                warn!(
                    dir = name,
                    modified = %modified,
                    "Scratch directory past max age still belongs to a running job, skipping"
                );
                report.skipped_active += 1;
                continue;
            }

            let path = entry.path();
            match tokio::fs::remove_dir_all(&path).await {
                Ok(()) => {
                    debug!(dir = name, modified = %modified, "Removed orphaned scratch directory");
                    report.removed += 1;
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to remove scratch directory");
                    report.failed += 1;
                }
            }
        }

        info!(
            root = %root.display(),
            removed = report.removed,
            skipped_active = report.skipped_active,
            failed = report.failed,
            "Scratch sweep complete"
        );
        Ok(report)
    }
}

#[async_trait]
impl PeriodicTask for ScratchReaper {
    fn name(&self) -> &'static str {
        "scratch_reaper"
    }

    async fn run_once(&self) -> Result<u64, AppError> {
        Ok(self.sweep_now().await?.removed)
    }
}
