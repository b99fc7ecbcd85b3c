//! Trait definitions for pluggable backends.

pub mod object_store;

pub use object_store::{ByteStream, ObjectMeta, ObjectStore};
