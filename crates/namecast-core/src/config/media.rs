//! External transcoding tool configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Settings for the remux and transcode invocations.
///
/// The codec fields form the normalized output profile every captured
/// source is converted to.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MediaConfig {
    /// Path or name of the ffmpeg executable.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,
    /// Hard timeout for the stream-copy remux.
    #[serde(default = "default_remux_timeout")]
    #[validate(range(min = 1, max = 600))]
    pub remux_timeout_seconds: u64,
    /// Transcodes that report no progress for this long are killed.
    #[serde(default = "default_stall_timeout")]
    #[validate(range(min = 1, max = 7200))]
    pub transcode_stall_timeout_seconds: u64,
    /// Target duration of each streaming segment.
    #[serde(default = "default_segment_seconds")]
    #[validate(range(min = 1, max = 60))]
    pub segment_seconds: u32,
    /// Video encoder.
    #[serde(default = "default_video_codec")]
    pub video_codec: String,
    /// Video bitrate (ffmpeg notation, e.g. `1500k`).
    #[serde(default = "default_video_bitrate")]
    pub video_bitrate: String,
    /// Output frame rate.
    #[serde(default = "default_frame_rate")]
    #[validate(range(min = 1, max = 120))]
    pub frame_rate: u32,
    /// Audio encoder.
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,
    /// Audio bitrate (ffmpeg notation).
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,
    /// Output audio sample rate in Hz.
    #[serde(default = "default_audio_sample_rate")]
    #[validate(range(min = 8000, max = 192000))]
    pub audio_sample_rate: u32,
    /// Number of trailing tool stderr lines kept for error reports.
    #[serde(default = "default_diagnostic_lines")]
    #[validate(range(min = 1, max = 1000))]
    pub diagnostic_lines: usize,
}

impl MediaConfig {
    /// Remux timeout as a [`Duration`].
    pub fn remux_timeout(&self) -> Duration {
        Duration::from_secs(self.remux_timeout_seconds)
    }

    /// Transcode stall window as a [`Duration`].
    pub fn transcode_stall_timeout(&self) -> Duration {
        Duration::from_secs(self.transcode_stall_timeout_seconds)
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            remux_timeout_seconds: default_remux_timeout(),
            transcode_stall_timeout_seconds: default_stall_timeout(),
            segment_seconds: default_segment_seconds(),
            video_codec: default_video_codec(),
            video_bitrate: default_video_bitrate(),
            frame_rate: default_frame_rate(),
            audio_codec: default_audio_codec(),
            audio_bitrate: default_audio_bitrate(),
            audio_sample_rate: default_audio_sample_rate(),
            diagnostic_lines: default_diagnostic_lines(),
        }
    }
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

fn default_remux_timeout() -> u64 {
    30
}

fn default_stall_timeout() -> u64 {
    300
}

fn default_segment_seconds() -> u32 {
    10
}

fn default_video_codec() -> String {
    "libx264".to_string()
}

fn default_video_bitrate() -> String {
    "1500k".to_string()
}

fn default_frame_rate() -> u32 {
    30
}

fn default_audio_codec() -> String {
    "aac".to_string()
}

fn default_audio_bitrate() -> String {
    "128k".to_string()
}

fn default_audio_sample_rate() -> u32 {
    44100
}

fn default_diagnostic_lines() -> usize {
    40
}
