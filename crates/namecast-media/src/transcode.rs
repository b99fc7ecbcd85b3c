//! HLS transcode with progress reporting and stall detection.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use namecast_core::config::MediaConfig;
use namecast_entity::MediaKind;
use namecast_entity::asset::MANIFEST_FILE_NAME;

use crate::error::MediaError;
use crate::manifest::read_segment_paths;
use crate::process::{Deadline, LineKind, ToolInvocation, ToolOutcome};
use crate::progress::{ProgressParser, TranscodeProgress};

/// Segment file name pattern handed to the HLS muxer.
pub const SEGMENT_PATTERN: &str = "segment_%03d.ts";

/// Manifest and segments produced by one transcode, segments in playback order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeOutput {
    /// Path of the manifest.
    pub manifest_path: PathBuf,
    /// Paths of the segments.
    pub segment_paths: Vec<PathBuf>,
}

/// Re-encodes a source into a normalized HLS asset.
#[derive(Debug, Clone)]
pub struct Transcoder {
    config: MediaConfig,
}

impl Transcoder {
    /// Create a transcoder from media configuration.
    pub fn new(config: &MediaConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Stall window after which a silent transcode is killed.
    pub fn stall_timeout(&self) -> Duration {
        self.config.transcode_stall_timeout()
    }

    /// Arguments for transcoding `input` into an HLS asset inside `work_dir`.
    pub fn args(&self, input: &Path, work_dir: &Path, kind: MediaKind) -> Vec<OsString> {
        let c = &self.config;
        let mut args: Vec<OsString> = vec!["-hide_banner".into(), "-nostdin".into(), "-y".into()];
        args.push("-i".into());
        args.push(input.as_os_str().to_owned());

        if kind.has_video() {
            let gop = (c.frame_rate * c.segment_seconds).max(1);
            args.extend(
                [
                    "-c:v".to_string(),
                    c.video_codec.clone(),
                    "-preset".to_string(),
                    "veryfast".to_string(),
                    "-b:v".to_string(),
                    c.video_bitrate.clone(),
                    "-r".to_string(),
                    c.frame_rate.to_string(),
                    "-pix_fmt".to_string(),
                    "yuv420p".to_string(),
                    // Keyframe on every segment boundary.
                    "-g".to_string(),
                    gop.to_string(),
                    "-sc_threshold".to_string(),
                    "0".to_string(),
                ]
                .map(OsString::from),
            );
        } else {
            args.push("-vn".into());
        }

        args.extend(
            [
                "-c:a".to_string(),
                c.audio_codec.clone(),
                "-b:a".to_string(),
                c.audio_bitrate.clone(),
                "-ar".to_string(),
                c.audio_sample_rate.to_string(),
                "-ac".to_string(),
                "2".to_string(),
                "-f".to_string(),
                "hls".to_string(),
                "-hls_time".to_string(),
                c.segment_seconds.to_string(),
                "-hls_playlist_type".to_string(),
                "vod".to_string(),
                "-hls_segment_filename".to_string(),
            ]
            .map(OsString::from),
        );
        args.push(work_dir.join(SEGMENT_PATTERN).into_os_string());
        args.push(work_dir.join(MANIFEST_FILE_NAME).into_os_string());
        args
    }

    /// Transcode `input` into `work_dir/manifest.m3u8` plus segments.
    ///
    /// Progress samples go to `progress` when given; a lagging receiver
    /// misses samples rather than slowing the tool down. The process group
    /// is killed when no progress line arrives within the stall window or
    /// when `cancel` fires. A nonzero exit is returned as is, never retried.
    #[instrument(skip(self, progress, cancel), fields(input = %input.display(), kind = %kind))]
    pub async fn transcode(
        &self,
        input: &Path,
        work_dir: &Path,
        kind: MediaKind,
        progress: Option<mpsc::Sender<TranscodeProgress>>,
        cancel: &CancellationToken,
    ) -> Result<TranscodeOutput, MediaError> {
        let stall = self.stall_timeout();
        let invocation = ToolInvocation {
            program: self.config.ffmpeg_path.clone(),
            args: self.args(input, work_dir, kind),
            deadline: Deadline::Stall(stall),
            diagnostic_lines: self.config.diagnostic_lines,
        };

        let mut parser = ProgressParser::new();
        let mut samples = 0u64;
        let outcome = invocation
            .run(cancel, |line| match parser.observe(line) {
                Some(sample) => {
                    samples += 1;
                    if let Some(tx) = &progress {
                        if tx.try_send(sample).is_err() {
                            debug!("Progress receiver lagging or gone, sample dropped");
                        }
                    }
                    LineKind::Progress
                }
                None => LineKind::Diagnostic,
            })
            .await?;
        drop(progress);

        match outcome {
            ToolOutcome::Exited { status, .. } if status.success() => {
                let manifest_path = work_dir.join(MANIFEST_FILE_NAME);
                let segment_paths = read_segment_paths(&manifest_path).await?;
                info!(segments = segment_paths.len(), samples, "Transcode complete");
                Ok(TranscodeOutput {
                    manifest_path,
                    segment_paths,
                })
            }
            ToolOutcome::Exited { status, diagnostics } => Err(MediaError::TranscodeFailed {
                code: status.code(),
                diagnostics,
            }),
            ToolOutcome::TimedOut { diagnostics } => Err(MediaError::TranscodeTimedOut {
                stall_seconds: stall.as_secs(),
                diagnostics,
            }),
            ToolOutcome::Cancelled => Err(MediaError::Cancelled { stage: "transcode" }),
        }
    }
}
