//! # namecast-service
//!
//! The ingest pipeline as seen by a transport layer: receive chunks,
//! finalize an upload into a published streaming asset, and report status.
//! Every failure after a job starts rolls the record back and removes the
//! job's scratch directory.

pub mod ingest;
pub mod publish;
pub mod record;
pub mod retry;

pub use ingest::{
    ErrorPayload, FinalizeError, FinalizeOutcome, FinalizeRequest, IngestService, JobStatus,
    ServiceStatus,
};
pub use publish::{PublishError, PublishUploader};
pub use record::{CommitReport, RecordAttempt, RecordStateCoordinator, RollbackOutcome};
pub use retry::RetryPolicy;
