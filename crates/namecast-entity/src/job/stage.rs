//! Pipeline stage enumeration.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stage a finalize job is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStage {
    /// Writing the chunk set into the job's work directory.
    Reassembling,
    /// Rewriting container metadata without re-encoding.
    Remuxing,
    /// Encoding the segmented streaming asset.
    Transcoding,
    /// Uploading manifest and segments.
    Publishing,
    /// Flipping the record to recorded.
    Committing,
    /// Finished successfully.
    Done,
    /// Finished with a failure and rolled back.
    Failed,
}

impl JobStage {
    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Return the stage as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reassembling => "reassembling",
            Self::Remuxing => "remuxing",
            Self::Transcoding => "transcoding",
            Self::Publishing => "publishing",
            Self::Committing => "committing",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
