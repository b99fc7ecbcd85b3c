//! Recording entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::media_kind::MediaKind;

/// A recording row: the record the ingest pipeline flips between
/// recorded and unrecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Recording {
    /// Primary key.
    pub id: i64,
    /// Display name the recording belongs to.
    pub name: String,
    /// Whether a published recording exists.
    pub is_recorded: bool,
    /// When the current recording was committed.
    pub recorded_at: Option<DateTime<Utc>>,
    /// Manifest key of the processed audio asset.
    pub processed_audio_path: Option<String>,
    /// Manifest key of the processed video asset.
    pub processed_video_path: Option<String>,
}

impl Recording {
    /// Create an unrecorded row.
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            is_recorded: false,
            recorded_at: None,
            processed_audio_path: None,
            processed_video_path: None,
        }
    }

    /// The processed path for a media kind.
    pub fn processed_path(&self, kind: MediaKind) -> Option<&str> {
        match kind {
            MediaKind::Audio => self.processed_audio_path.as_deref(),
            MediaKind::Video => self.processed_video_path.as_deref(),
        }
    }

    /// Apply a successful commit in place.
    pub fn apply_commit(&mut self, kind: MediaKind, path: &str, at: DateTime<Utc>) {
        self.is_recorded = true;
        self.recorded_at = Some(at);
        match kind {
            MediaKind::Audio => self.processed_audio_path = Some(path.to_string()),
            MediaKind::Video => self.processed_video_path = Some(path.to_string()),
        }
    }

    /// The fields a commit for `kind` writes, as they are now.
    pub fn recorded_state(&self, kind: MediaKind) -> RecordedState {
        RecordedState {
            is_recorded: self.is_recorded,
            recorded_at: self.recorded_at,
            processed_path: self.processed_path(kind).map(str::to_string),
        }
    }

    /// Overwrite the fields a commit for `kind` writes.
    pub fn restore_state(&mut self, kind: MediaKind, state: &RecordedState) {
        self.is_recorded = state.is_recorded;
        self.recorded_at = state.recorded_at;
        match kind {
            MediaKind::Audio => self.processed_audio_path = state.processed_path.clone(),
            MediaKind::Video => self.processed_video_path = state.processed_path.clone(),
        }
    }
}

/// The recorded flag, commit time and one kind's processed path of a record.
///
/// Used as the expected value of a compare-and-set and as the value a
/// failed attempt puts back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedState {
    /// Whether a published recording exists.
    pub is_recorded: bool,
    /// When the current recording was committed.
    pub recorded_at: Option<DateTime<Utc>>,
    /// Manifest key for the media kind.
    pub processed_path: Option<String>,
}

impl RecordedState {
    /// Unrecorded with no path.
    pub fn unrecorded() -> Self {
        Self::default()
    }
}
