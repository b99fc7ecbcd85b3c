//! Published asset value object.

pub mod model;

pub use model::{MANIFEST_CONTENT_TYPE, MANIFEST_FILE_NAME, PublishedAsset, SEGMENT_CONTENT_TYPE};
