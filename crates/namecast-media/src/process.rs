//! Subprocess runner shared by the remux and transcode steps.
//!
//! The tool is started in its own process group. Its diagnostic stream is
//! split on `\r` and `\n` (ffmpeg rewrites its stats line with carriage
//! returns), each line is classified by the caller, and a deadline races
//! the process. Progress lines may push the deadline forward. On deadline
//! or cancellation the entire group is killed and reaped.

use std::collections::VecDeque;
use std::ffi::OsString;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use tokio::process::{Child, Command};
use tokio::time::{Instant, sleep_until};
use tokio_util::codec::{AnyDelimiterCodec, AnyDelimiterCodecError, Decoder, FramedRead};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::MediaError;

/// Longest single diagnostic line kept; longer lines are dropped.
const MAX_LINE_BYTES: usize = 64 * 1024;

/// How a diagnostic line was interpreted by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// A progress report; excluded from diagnostics.
    Progress,
    /// Anything else.
    Diagnostic,
}

/// Deadline policy for one invocation.
#[derive(Debug, Clone, Copy)]
pub enum Deadline {
    /// Fixed budget from spawn.
    Hard(Duration),
    /// Budget restarted by every progress line.
    Stall(Duration),
}

impl Deadline {
    fn window(&self) -> Duration {
        match self {
            Self::Hard(d) | Self::Stall(d) => *d,
        }
    }
}

/// One invocation of an external tool.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    /// Program to run.
    pub program: String,
    /// Arguments.
    pub args: Vec<OsString>,
    /// Deadline policy.
    pub deadline: Deadline,
    /// Number of trailing diagnostic lines to keep.
    pub diagnostic_lines: usize,
}

/// How an invocation ended.
#[derive(Debug)]
pub enum ToolOutcome {
    /// The process exited on its own.
    Exited {
        /// Exit status.
        status: ExitStatus,
        /// Trailing diagnostics.
        diagnostics: String,
    },
    /// The deadline expired and the group was killed.
    TimedOut {
        /// Trailing diagnostics.
        diagnostics: String,
    },
    /// Cancellation was requested and the group was killed.
    Cancelled,
}

/// Splits the diagnostic stream on `\r` and `\n`.
///
/// A line longer than [`MAX_LINE_BYTES`] is dropped up to its delimiter
/// and decoding carries on; the stream only ends at EOF or on an I/O error.
#[derive(Debug)]
struct DiagnosticLines {
    inner: AnyDelimiterCodec,
    skipped: u64,
}

impl DiagnosticLines {
    fn new() -> Self {
        Self {
            inner: AnyDelimiterCodec::new_with_max_length(b"\r\n".to_vec(), Vec::new(), MAX_LINE_BYTES),
            skipped: 0,
        }
    }
}

impl Decoder for DiagnosticLines {
    type Item = Bytes;
    type Error = std::io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Bytes>, Self::Error> {
        loop {
            match self.inner.decode(buf) {
                Ok(frame) => return Ok(frame),
                // The inner codec is now discarding up to the next delimiter.
                Err(AnyDelimiterCodecError::MaxChunkLengthExceeded) => self.skipped += 1,
                Err(AnyDelimiterCodecError::Io(e)) => return Err(e),
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Bytes>, Self::Error> {
        loop {
            match self.inner.decode_eof(buf) {
                Ok(frame) => return Ok(frame),
                Err(AnyDelimiterCodecError::MaxChunkLengthExceeded) => self.skipped += 1,
                Err(AnyDelimiterCodecError::Io(e)) => return Err(e),
            }
        }
    }
}

/// Bounded tail of the tool's diagnostic lines.
#[derive(Debug)]
struct DiagnosticTail {
    lines: VecDeque<String>,
    capacity: usize,
}

impl DiagnosticTail {
    fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity.min(256)),
            capacity: capacity.max(1),
        }
    }

    fn push(&mut self, line: String) {
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    fn render(&self) -> String {
        self.lines.iter().map(String::as_str).collect::<Vec<_>>().join("\n")
    }
}

impl ToolInvocation {
    /// Run to completion, deadline, or cancellation.
    ///
    /// `classify` sees every non-empty diagnostic line.
    pub async fn run(
        &self,
        cancel: &CancellationToken,
        mut classify: impl FnMut(&str) -> LineKind,
    ) -> Result<ToolOutcome, MediaError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        debug!(program = %self.program, args = ?self.args, "Spawning tool");

        let mut child = cmd.spawn().map_err(|source| MediaError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        let mut tail = DiagnosticTail::new(self.diagnostic_lines);
        let window = self.deadline.window();
        let mut deadline = Instant::now() + window;

        let Some(stderr) = child.stderr.take() else {
            terminate(&mut child).await;
            return Err(MediaError::Io(std::io::Error::other("tool stderr was not captured")));
        };
        let mut lines = FramedRead::new(stderr, DiagnosticLines::new());
        let mut stream_open = true;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    terminate(&mut child).await;
                    return Ok(ToolOutcome::Cancelled);
                }
                _ = sleep_until(deadline) => {
                    warn!(program = %self.program, window_s = window.as_secs(), "Tool deadline expired, killing process group");
                    terminate(&mut child).await;
                    return Ok(ToolOutcome::TimedOut { diagnostics: tail.render() });
                }
                frame = lines.next(), if stream_open => match frame {
                    Some(Ok(bytes)) => {
                        let line = String::from_utf8_lossy(&bytes);
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        match classify(line) {
                            LineKind::Progress => {
                                if let Deadline::Stall(stall) = self.deadline {
                                    deadline = Instant::now() + stall;
                                }
                            }
                            LineKind::Diagnostic => tail.push(line.to_string()),
                        }
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "Diagnostic stream failed, waiting for exit");
                        stream_open = false;
                    }
                    None => {
                        let skipped = lines.decoder().skipped;
                        if skipped > 0 {
                            debug!(skipped, "Dropped oversized diagnostic lines");
                        }
                        stream_open = false;
                    }
                },
                status = child.wait(), if !stream_open => {
                    let status = status?;
                    return Ok(ToolOutcome::Exited { status, diagnostics: tail.render() });
                }
            }
        }
    }
}

/// Kill the child's process group and reap the child.
async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        // SAFETY: killpg only sends a signal; the group was created for this
        // child by `process_group(0)`, so its id equals the child's pid.
        let rc = unsafe { libc::killpg(pid as libc::pid_t, libc::SIGKILL) };
        if rc != 0 {
            debug!(pid, error = %std::io::Error::last_os_error(), "killpg failed");
        }
    }
    if let Err(e) = child.start_kill() {
        debug!(error = %e, "Child already exited");
    }
    if let Err(e) = child.wait().await {
        warn!(error = %e, "Failed to reap killed tool process");
    }
}
