//! Stream-copy remux that repairs interrupted captures.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use namecast_core::config::MediaConfig;

use crate::error::MediaError;
use crate::process::{Deadline, LineKind, ToolInvocation, ToolOutcome};

/// File name of the remuxed container inside the job directory.
pub const REMUX_OUTPUT_NAME: &str = "remuxed.mkv";

/// Rewrites container metadata without touching the encoded streams.
///
/// Browser captures cut off mid-recording often lack a proper index or
/// carry broken timestamps. The remux regenerates presentation timestamps
/// and drops corrupt packets instead of failing on them.
#[derive(Debug, Clone)]
pub struct Remuxer {
    ffmpeg_path: String,
    timeout: Duration,
    diagnostic_lines: usize,
}

impl Remuxer {
    /// Create a remuxer from media configuration.
    pub fn new(config: &MediaConfig) -> Self {
        Self {
            ffmpeg_path: config.ffmpeg_path.clone(),
            timeout: config.remux_timeout(),
            diagnostic_lines: config.diagnostic_lines,
        }
    }

    /// Arguments for remuxing `input` into `output`.
    pub fn args(input: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = [
            "-hide_banner",
            "-nostdin",
            "-nostats",
            "-y",
            "-fflags",
            "+genpts+igndts+discardcorrupt",
            "-err_detect",
            "ignore_err",
            "-i",
        ]
        .into_iter()
        .map(OsString::from)
        .collect();
        args.push(input.as_os_str().to_owned());
        args.extend(
            [
                "-map",
                "0",
                "-c",
                "copy",
                "-avoid_negative_ts",
                "make_zero",
                "-max_muxing_queue_size",
                "9999",
                "-f",
                "matroska",
            ]
            .into_iter()
            .map(OsString::from),
        );
        args.push(output.as_os_str().to_owned());
        args
    }

    /// Remux `input` into `remuxed.mkv` next to it and return that path.
    ///
    /// The process is killed if it outlives the remux timeout. No retry
    /// happens here.
    #[instrument(skip(self, cancel), fields(input = %input.display()))]
    pub async fn remux(&self, input: &Path, cancel: &CancellationToken) -> Result<PathBuf, MediaError> {
        let dir = input.parent().unwrap_or_else(|| Path::new("."));
        let output = dir.join(REMUX_OUTPUT_NAME);

        let invocation = ToolInvocation {
            program: self.ffmpeg_path.clone(),
            args: Self::args(input, &output),
            deadline: Deadline::Hard(self.timeout),
            diagnostic_lines: self.diagnostic_lines,
        };

        match invocation.run(cancel, |_| LineKind::Diagnostic).await? {
            ToolOutcome::Exited { status, diagnostics } if status.success() => {
                let size = tokio::fs::metadata(&output).await.map(|m| m.len()).unwrap_or(0);
                if size == 0 {
                    warn!(output = %output.display(), "Remux exited cleanly but wrote nothing");
                    return Err(MediaError::RemuxFailed {
                        code: status.code(),
                        diagnostics: if diagnostics.is_empty() {
                            "no output written".to_string()
                        } else {
                            diagnostics
                        },
                    });
                }
                info!(bytes = size, "Remux complete");
                Ok(output)
            }
            ToolOutcome::Exited { status, diagnostics } => Err(MediaError::RemuxFailed {
                code: status.code(),
                diagnostics,
            }),
            ToolOutcome::TimedOut { diagnostics } => Err(MediaError::RemuxTimedOut {
                timeout_seconds: self.timeout.as_secs(),
                diagnostics,
            }),
            ToolOutcome::Cancelled => Err(MediaError::Cancelled { stage: "remux" }),
        }
    }
}
