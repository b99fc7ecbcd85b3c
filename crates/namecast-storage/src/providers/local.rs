//! Local filesystem object store.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tokio_util::io::ReaderStream;
use tracing::debug;

use namecast_core::error::{AppError, ErrorKind};
use namecast_core::result::AppResult;
use namecast_core::traits::{ByteStream, ObjectMeta, ObjectStore};

use super::content_type_from_key;

/// Object store keeping each bucket as a directory under a root path.
///
/// Content types are not persisted; they are derived from the key's
/// extension on read.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
    bucket: String,
    public_base_url: String,
}

impl LocalObjectStore {
    /// Create a store rooted at `root_path`. The bucket directory is not
    /// created until [`create_bucket`](ObjectStore::create_bucket).
    pub async fn new(root_path: &str, bucket: &str, public_base_url: &str) -> AppResult<Self> {
        let root = PathBuf::from(root_path);
        fs::create_dir_all(&root).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create storage root: {}", root.display()),
                e,
            )
        })?;
        Ok(Self {
            root,
            bucket: bucket.to_string(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn bucket_dir(&self) -> PathBuf {
        self.root.join(&self.bucket)
    }

    /// Map a key to a path inside the bucket directory, rejecting keys that
    /// would escape it.
    fn resolve(&self, key: &str) -> AppResult<PathBuf> {
        let relative = Path::new(key.trim_start_matches('/'));
        if relative.as_os_str().is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(AppError::validation(format!("Invalid object key '{key}'")));
        }
        Ok(self.bucket_dir().join(relative))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    fn provider_type(&self) -> &str {
        "local"
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(fs::metadata(&self.root).await.is_ok_and(|m| m.is_dir()))
    }

    async fn bucket_exists(&self) -> AppResult<bool> {
        Ok(fs::metadata(self.bucket_dir()).await.is_ok_and(|m| m.is_dir()))
    }

    async fn create_bucket(&self) -> AppResult<()> {
        let dir = self.bucket_dir();
        fs::create_dir_all(&dir).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create bucket directory: {}", dir.display()),
                e,
            )
        })
    }

    async fn put_object(&self, key: &str, data: Bytes, _content_type: &str) -> AppResult<()> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to create parent directory for '{key}'"),
                    e,
                )
            })?;
        }

        // Write then rename so readers never see a half-written object.
        let mut tmp = path.clone().into_os_string();
        tmp.push(".partial");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, &data).await.map_err(|e| {
            AppError::with_source(ErrorKind::Storage, format!("Failed to write object '{key}'"), e)
        })?;
        fs::rename(&tmp, &path).await.map_err(|e| {
            AppError::with_source(ErrorKind::Storage, format!("Failed to store object '{key}'"), e)
        })?;

        debug!(key, bytes = data.len(), "Stored object");
        Ok(())
    }

    async fn get_object(&self, key: &str) -> AppResult<ByteStream> {
        let path = self.resolve(key)?;
        let file = fs::File::open(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::not_found(format!("Object not found: {key}"))
            } else {
                AppError::with_source(ErrorKind::Storage, format!("Failed to open object '{key}'"), e)
            }
        })?;
        Ok(Box::pin(ReaderStream::new(file)))
    }

    async fn head_object(&self, key: &str) -> AppResult<Option<ObjectMeta>> {
        let path = self.resolve(key)?;
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(Some(ObjectMeta {
                key: key.to_string(),
                size_bytes: meta.len(),
                content_type: content_type_from_key(key).map(str::to_string),
            })),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to stat object '{key}'"),
                e,
            )),
        }
    }

    async fn delete_object(&self, key: &str) -> AppResult<()> {
        let path = self.resolve(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to delete object '{key}'"),
                e,
            )),
        }
    }

    async fn presigned_url(&self, key: &str, expires_in: Duration) -> AppResult<String> {
        self.resolve(key)?;
        let expires_at = chrono::Utc::now().timestamp() + expires_in.as_secs() as i64;
        Ok(format!(
            "{}/{}/{}?expires={expires_at}",
            self.public_base_url,
            self.bucket,
            key.trim_start_matches('/')
        ))
    }
}
