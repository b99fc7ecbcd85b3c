//! # namecast-entity
//!
//! Domain entity models for Namecast. Every struct in this crate
//! represents a database table row or a domain value object. All entities
//! derive `Debug`, `Clone`, `Serialize`, `Deserialize`, and database
//! entities additionally derive `sqlx::FromRow`.

pub mod asset;
pub mod job;
pub mod recording;

pub use asset::PublishedAsset;
pub use job::{JobStage, TranscodeJob};
pub use recording::{MediaKind, RecordedState, Recording};
