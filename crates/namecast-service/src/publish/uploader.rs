//! Manifest-then-segments upload with bounded parallelism and per-object retry.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use futures::stream;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use namecast_core::config::PublishConfig;
use namecast_core::traits::ObjectStore;
use namecast_entity::MediaKind;
use namecast_entity::PublishedAsset;
use namecast_entity::asset::{MANIFEST_CONTENT_TYPE, SEGMENT_CONTENT_TYPE};

use super::error::PublishError;
use crate::retry::RetryPolicy;

/// Outcome of one segment task.
enum SegmentOutcome {
    Stored(String),
    Failed(PublishError),
    Skipped,
}

/// Pushes a transcoded asset into object storage.
///
/// The manifest goes first, then the segments with at most `concurrency`
/// transfers in flight. A segment that fails all its attempts fails the
/// whole publish: uploads not yet started are skipped, uploads already
/// running finish, and every key stored during the attempt is deleted.
#[derive(Debug, Clone)]
pub struct PublishUploader {
    store: Arc<dyn ObjectStore>,
    concurrency: usize,
    retry: RetryPolicy,
}

impl PublishUploader {
    /// Create an uploader.
    pub fn new(store: Arc<dyn ObjectStore>, concurrency: usize, retry: RetryPolicy) -> Self {
        Self {
            store,
            concurrency: concurrency.max(1),
            retry,
        }
    }

    /// Create an uploader from publish configuration.
    pub fn from_config(store: Arc<dyn ObjectStore>, config: &PublishConfig) -> Self {
        Self::new(store, config.concurrency, RetryPolicy::from_config(config))
    }

    /// Upload `manifest_path` and `segment_paths` under `key_prefix`.
    ///
    /// Object keys are `{key_prefix}/{file name}`. The returned asset lists
    /// segment keys in the order given.
    #[instrument(skip(self, manifest_path, segment_paths, cancel), fields(segments = segment_paths.len()))]
    pub async fn publish(
        &self,
        manifest_path: &Path,
        segment_paths: &[PathBuf],
        key_prefix: &str,
        media_kind: MediaKind,
        cancel: &CancellationToken,
    ) -> Result<PublishedAsset, PublishError> {
        let manifest_key = object_key(key_prefix, manifest_path)?;
        let segment_keys = segment_paths
            .iter()
            .map(|p| object_key(key_prefix, p))
            .collect::<Result<Vec<_>, _>>()?;

        if cancel.is_cancelled() {
            return Err(PublishError::Cancelled);
        }
        self.transfer(manifest_path.to_path_buf(), manifest_key.clone(), MANIFEST_CONTENT_TYPE)
            .await?;

        let abort = cancel.child_token();
        let jobs = segment_paths.iter().cloned().zip(segment_keys.iter().cloned());
        let outcomes: Vec<SegmentOutcome> = stream::iter(jobs)
            .map(|(path, key)| {
                let abort = abort.clone();
                let upload = self.transfer(path, key.clone(), SEGMENT_CONTENT_TYPE);
                async move {
                    if abort.is_cancelled() {
                        return SegmentOutcome::Skipped;
                    }
                    match upload.await {
                        Ok(()) => SegmentOutcome::Stored(key),
                        Err(e) => {
                            abort.cancel();
                            SegmentOutcome::Failed(e)
                        }
                    }
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut stored = vec![manifest_key.clone()];
        let mut first_error = None;
        let mut skipped = 0usize;
        for outcome in outcomes {
            match outcome {
                SegmentOutcome::Stored(key) => stored.push(key),
                SegmentOutcome::Failed(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
                SegmentOutcome::Skipped => skipped += 1,
            }
        }

        let failure = match first_error {
            Some(e) => Some(e),
            None if skipped > 0 || cancel.is_cancelled() => Some(PublishError::Cancelled),
            None => None,
        };

        if let Some(err) = failure {
            error!(
                key_prefix,
                stored = stored.len(),
                skipped,
                error = %err,
                "Publish failed, removing stored objects"
            );
            self.delete_keys(stored).await;
            return Err(err);
        }

        info!(key_prefix, objects = stored.len(), "Published asset");
        Ok(PublishedAsset {
            manifest_object_key: manifest_key,
            segment_object_keys: segment_keys,
            media_kind,
        })
    }

    /// Delete every object of an asset. Best effort.
    pub async fn unpublish(&self, asset: &PublishedAsset) -> usize {
        self.delete_keys(asset.all_keys().map(str::to_string).collect())
            .await
    }

    /// Delete keys, logging failures. Returns how many deletes succeeded.
    async fn delete_keys(&self, keys: Vec<String>) -> usize {
        let results: Vec<bool> = stream::iter(keys)
            .map(|key| {
                let store = self.store.clone();
                async move {
                    match store.delete_object(&key).await {
                        Ok(()) => true,
                        Err(e) => {
                            warn!(key = %key, error = %e, "Failed to delete object");
                            false
                        }
                    }
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;
        results.into_iter().filter(|ok| *ok).count()
    }

    /// Read one artifact and put it under `key`, retrying per the policy.
    ///
    /// The returned future owns everything it touches.
    fn transfer(
        &self,
        path: PathBuf,
        key: String,
        content_type: &'static str,
    ) -> impl Future<Output = Result<(), PublishError>> + Send + 'static {
        let store = self.store.clone();
        let retry = self.retry;
        async move {
            let data = Bytes::from(
                tokio::fs::read(&path)
                    .await
                    .map_err(|source| PublishError::Read { path, source })?,
            );

            retry
                .run(&key, |_| {
                    let store = store.clone();
                    let key = key.clone();
                    let data = data.clone();
                    async move { store.put_object(&key, data, content_type).await }
                })
                .await
                .map_err(|exhausted| PublishError::Upload {
                    key: key.clone(),
                    attempt: exhausted.attempt,
                    max_attempts: retry.max_attempts,
                    source: exhausted.error,
                })
        }
    }
}

fn object_key(prefix: &str, path: &Path) -> Result<String, PublishError> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| PublishError::BadArtifact(path.to_path_buf()))?;
    Ok(format!("{}/{name}", prefix.trim_end_matches('/')))
}
