//! One-off scratch directory sweep.

use std::time::Duration;

use clap::Args;
use tabled::Tabled;

use namecast_core::config::AppConfig;
use namecast_core::error::AppError;
use namecast_storage::{ActiveWorkDirs, ScratchSpace};
use namecast_worker::{ReapReport, ScratchReaper};

use crate::output::{self, OutputFormat};

/// Arguments for the sweep command
#[derive(Debug, Args)]
pub struct SweepArgs {
    /// Override the configured maximum age, in hours
    #[arg(long)]
    pub max_age_hours: Option<u64>,
}

#[derive(Tabled)]
struct ReportRow {
    #[tabled(rename = "Candidates")]
    candidates: u64,
    #[tabled(rename = "Removed")]
    removed: u64,
    #[tabled(rename = "Skipped (active)")]
    skipped_active: u64,
    #[tabled(rename = "Failed")]
    failed: u64,
}

impl From<&ReapReport> for ReportRow {
    fn from(r: &ReapReport) -> Self {
        Self {
            candidates: r.candidates,
            removed: r.removed,
            skipped_active: r.skipped_active,
            failed: r.failed,
        }
    }
}

/// Execute the sweep command
pub async fn execute(
    args: &SweepArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let max_age = args
        .max_age_hours
        .map(|h| Duration::from_secs(h * 3600))
        .unwrap_or_else(|| config.scratch.max_age());

    // A standalone sweep has no running jobs of its own to protect.
    let scratch = ScratchSpace::new(
        config.scratch.root_path(),
        config.scratch.prefix.clone(),
        ActiveWorkDirs::new(),
    );
    let reaper = ScratchReaper::new(scratch, max_age);
    let report = reaper.sweep_now().await?;

    output::print_rows(&[ReportRow::from(&report)], &report, format);
    Ok(())
}
