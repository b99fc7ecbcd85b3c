//! Parsing of ffmpeg's diagnostic stream into progress samples.

use std::time::Duration;

use serde::Serialize;

/// One progress sample from a running transcode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TranscodeProgress {
    /// Fraction of the input processed, `0.0..=1.0`. `None` until the
    /// input duration is known.
    pub fraction: Option<f64>,
    /// Media time written so far.
    pub out_time: Duration,
    /// Encoding speed relative to real time (`2.0` = twice real time).
    pub speed: Option<f64>,
    /// Output bitrate in kbit/s.
    pub bitrate_kbps: Option<f64>,
}

/// Stateful parser: learns the input duration from the header, then turns
/// each stats line into a [`TranscodeProgress`].
#[derive(Debug, Default)]
pub struct ProgressParser {
    total: Option<Duration>,
}

impl ProgressParser {
    /// Create a parser with no known duration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Input duration, once seen.
    pub fn total(&self) -> Option<Duration> {
        self.total
    }

    /// Feed one line. Returns a sample if the line was a stats line.
    pub fn observe(&mut self, line: &str) -> Option<TranscodeProgress> {
        if self.total.is_none() {
            if let Some(rest) = line.trim_start().strip_prefix("Duration:") {
                let value = rest.trim_start().split(',').next().unwrap_or_default();
                self.total = parse_timestamp(value.trim()).filter(|d| !d.is_zero());
                return None;
            }
        }

        let out_time = field(line, "time").and_then(parse_timestamp)?;
        let fraction = self
            .total
            .map(|total| (out_time.as_secs_f64() / total.as_secs_f64()).clamp(0.0, 1.0));
        let speed = field(line, "speed")
            .and_then(|v| v.strip_suffix('x'))
            .and_then(|v| v.parse::<f64>().ok());
        let bitrate_kbps = field(line, "bitrate")
            .and_then(|v| v.strip_suffix("kbits/s"))
            .and_then(|v| v.parse::<f64>().ok());

        Some(TranscodeProgress {
            fraction,
            out_time,
            speed,
            bitrate_kbps,
        })
    }
}

/// Value of `key=` in a stats line, tolerating padding after the `=`.
fn field<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let needle = format!("{key}=");
    let mut search_from = 0;
    while let Some(pos) = line[search_from..].find(&needle) {
        let start = search_from + pos;
        let at_boundary = start == 0 || line[..start].ends_with(char::is_whitespace);
        if at_boundary {
            let value = line[start + needle.len()..].trim_start();
            return value.split_whitespace().next();
        }
        search_from = start + needle.len();
    }
    None
}

/// Parse `HH:MM:SS(.frac)`. Negative or `N/A` values yield `None`.
pub fn parse_timestamp(value: &str) -> Option<Duration> {
    let mut parts = value.splitn(3, ':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if minutes >= 60 || !(0.0..60.0).contains(&seconds) {
        return None;
    }
    Some(Duration::from_secs(hours * 3600 + minutes * 60) + Duration::from_secs_f64(seconds))
}
