//! Object storage trait for the publish backend.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

use crate::result::AppResult;

/// Metadata about a stored object.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ObjectMeta {
    /// Object key within the bucket.
    pub key: String,
    /// Size in bytes.
    pub size_bytes: u64,
    /// Content type recorded at upload time.
    pub content_type: Option<String>,
}

/// A byte stream type used for reading object contents.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Trait for object storage backends.
///
/// Keys and content types are supplied by the caller. A successful
/// [`put_object`](ObjectStore::put_object) is assumed to be immediately
/// visible to readers.
#[async_trait]
pub trait ObjectStore: Send + Sync + std::fmt::Debug + 'static {
    /// Return the provider type name (e.g., "local", "s3").
    fn provider_type(&self) -> &str;

    /// The bucket this store writes into.
    fn bucket(&self) -> &str;

    /// Check whether the backend is reachable.
    async fn health_check(&self) -> AppResult<bool>;

    /// Check whether the configured bucket exists.
    async fn bucket_exists(&self) -> AppResult<bool>;

    /// Create the configured bucket.
    async fn create_bucket(&self) -> AppResult<()>;

    /// Store an object under `key`, replacing any previous content.
    async fn put_object(&self, key: &str, data: Bytes, content_type: &str) -> AppResult<()>;

    /// Read an object as a byte stream.
    async fn get_object(&self, key: &str) -> AppResult<ByteStream>;

    /// Fetch metadata for an object, `None` if it does not exist.
    async fn head_object(&self, key: &str) -> AppResult<Option<ObjectMeta>>;

    /// Delete an object. Deleting a missing key is not an error.
    async fn delete_object(&self, key: &str) -> AppResult<()>;

    /// Issue a time-limited GET URL for an object.
    async fn presigned_url(&self, key: &str, expires_in: Duration) -> AppResult<String>;
}
