//! # namecast-media
//!
//! Drives the external transcoding tool (ffmpeg) as a subprocess: a
//! stream-copy remux that repairs interrupted captures, and an HLS
//! transcode that reports progress while it runs. Each invocation owns its
//! timeout and kills the whole process group when it expires.

pub mod error;
pub mod manifest;
pub mod process;
pub mod progress;
pub mod remux;
pub mod transcode;

pub use error::MediaError;
pub use progress::TranscodeProgress;
pub use remux::Remuxer;
pub use transcode::{TranscodeOutput, Transcoder};
