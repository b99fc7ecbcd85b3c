//! Chunk receipt, finalize orchestration and status reporting.

pub mod error;
mod job;
pub mod service;
pub mod status;

pub use error::{ErrorPayload, FinalizeError};
pub use service::{FinalizeOutcome, FinalizeRequest, IngestService};
pub use status::{JobStatus, ServiceStatus, StoreHealth};
