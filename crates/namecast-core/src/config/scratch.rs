//! Scratch directory and reaper configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Where job scratch directories live and how long orphans survive.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ScratchConfig {
    /// Root under which every job directory is created.
    #[serde(default = "default_root")]
    pub root: String,
    /// Name prefix identifying directories the reaper may remove.
    #[serde(default = "default_prefix")]
    #[validate(length(min = 1))]
    pub prefix: String,
    /// Directories older than this are considered orphaned.
    #[serde(default = "default_max_age_hours")]
    #[validate(range(min = 1))]
    pub max_age_hours: u64,
    /// Interval between reaper sweeps.
    #[serde(default = "default_sweep_interval")]
    #[validate(range(min = 1))]
    pub sweep_interval_seconds: u64,
}

impl ScratchConfig {
    /// Scratch root as a path.
    pub fn root_path(&self) -> PathBuf {
        PathBuf::from(&self.root)
    }

    /// Orphan age threshold as a [`Duration`].
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_hours * 3600)
    }

    /// Sweep interval as a [`Duration`].
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }
}

impl Default for ScratchConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            prefix: default_prefix(),
            max_age_hours: default_max_age_hours(),
            sweep_interval_seconds: default_sweep_interval(),
        }
    }
}

fn default_root() -> String {
    "./data/scratch".to_string()
}

fn default_prefix() -> String {
    "job".to_string()
}

fn default_max_age_hours() -> u64 {
    24
}

fn default_sweep_interval() -> u64 {
    3600
}
