//! In-memory object store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use namecast_core::error::AppError;
use namecast_core::result::AppResult;
use namecast_core::traits::{ByteStream, ObjectMeta, ObjectStore};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    content_type: String,
}

/// Object store held entirely in process memory.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    bucket: String,
    bucket_created: AtomicBool,
    objects: DashMap<String, StoredObject>,
}

impl MemoryObjectStore {
    /// Create an empty store for `bucket`.
    pub fn new(bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            ..Self::default()
        }
    }

    /// Keys currently stored, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Stored bytes for a key.
    pub fn object_bytes(&self, key: &str) -> Option<Bytes> {
        self.objects.get(key).map(|o| o.data.clone())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    fn provider_type(&self) -> &str {
        "memory"
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }

    async fn bucket_exists(&self) -> AppResult<bool> {
        Ok(self.bucket_created.load(Ordering::Acquire))
    }

    async fn create_bucket(&self) -> AppResult<()> {
        self.bucket_created.store(true, Ordering::Release);
        Ok(())
    }

    async fn put_object(&self, key: &str, data: Bytes, content_type: &str) -> AppResult<()> {
        self.objects.insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn get_object(&self, key: &str) -> AppResult<ByteStream> {
        let data = self
            .object_bytes(key)
            .ok_or_else(|| AppError::not_found(format!("Object not found: {key}")))?;
        Ok(Box::pin(futures::stream::once(async move {
            Ok::<_, std::io::Error>(data)
        })))
    }

    async fn head_object(&self, key: &str) -> AppResult<Option<ObjectMeta>> {
        Ok(self.objects.get(key).map(|o| ObjectMeta {
            key: key.to_string(),
            size_bytes: o.data.len() as u64,
            content_type: Some(o.content_type.clone()),
        }))
    }

    async fn delete_object(&self, key: &str) -> AppResult<()> {
        self.objects.remove(key);
        Ok(())
    }

    async fn presigned_url(&self, key: &str, expires_in: Duration) -> AppResult<String> {
        Ok(format!(
            "memory://{}/{key}?expires_in={}",
            self.bucket,
            expires_in.as_secs()
        ))
    }
}
