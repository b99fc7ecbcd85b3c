//! # namecast-storage
//!
//! In-memory chunk sessions, reassembly into job scratch directories, and
//! the object storage backends published assets are written to.

pub mod chunked;
pub mod manager;
pub mod providers;
pub mod scratch;

pub use chunked::{ChunkReceipt, ChunkStore, IncomingChunk, Reassembler, UploadSession};
pub use manager::build_object_store;
pub use scratch::{ActiveWorkDirs, ScratchSpace, WorkDir};
