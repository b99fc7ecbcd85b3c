//! Media kind enumeration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use namecast_core::error::AppError;

/// Whether a recording carries audio only or video with audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Audio-only recording.
    Audio,
    /// Video recording with an audio track.
    Video,
}

impl MediaKind {
    /// Return the kind as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }

    /// Column holding the processed path for this kind.
    pub fn path_column(&self) -> &'static str {
        match self {
            Self::Audio => "processed_audio_path",
            Self::Video => "processed_video_path",
        }
    }

    /// Whether the normalized output carries a video stream.
    pub fn has_video(&self) -> bool {
        matches!(self, Self::Video)
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "audio" => Ok(Self::Audio),
            "video" => Ok(Self::Video),
            other => Err(AppError::validation(format!(
                "Unknown media kind '{other}' (expected 'audio' or 'video')"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("Video".parse::<MediaKind>().expect("parse"), MediaKind::Video);
        assert_eq!(" audio ".parse::<MediaKind>().expect("parse"), MediaKind::Audio);
        assert!("podcast".parse::<MediaKind>().is_err());
    }

    #[test]
    fn test_path_column() {
        assert_eq!(MediaKind::Audio.path_column(), "processed_audio_path");
        assert_eq!(MediaKind::Video.path_column(), "processed_video_path");
    }
}
