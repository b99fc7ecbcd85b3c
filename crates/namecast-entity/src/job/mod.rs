//! Transcode job entity and stage enumeration.

pub mod model;
pub mod stage;

pub use model::TranscodeJob;
pub use stage::JobStage;
