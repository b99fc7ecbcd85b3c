//! Publishing transcoded assets to object storage.

pub mod error;
pub mod uploader;

pub use error::PublishError;
pub use uploader::PublishUploader;
