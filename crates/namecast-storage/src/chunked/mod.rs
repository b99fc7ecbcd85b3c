//! Chunked upload handling.

pub mod assembler;
pub mod session;
pub mod store;

pub use assembler::Reassembler;
pub use session::UploadSession;
pub use store::{ChunkReceipt, ChunkStore, IncomingChunk};
