//! Integration tests for the ingest pipeline.
//!
//! The transcoding tool is replaced by a `/bin/sh` script, so these only
//! run on unix.

#![cfg(unix)]

mod helpers;
mod pipeline_test;
mod publish_test;
mod reaper_test;
