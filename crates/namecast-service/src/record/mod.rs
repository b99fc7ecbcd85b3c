//! Record state transitions driven by the pipeline.

pub mod coordinator;

pub use coordinator::{CommitReport, RecordAttempt, RecordStateCoordinator, RollbackOutcome};
