//! Object store selection from configuration.

use std::sync::Arc;

use tracing::info;

use namecast_core::config::StorageConfig;
use namecast_core::error::AppError;
use namecast_core::result::AppResult;
use namecast_core::traits::ObjectStore;

use crate::providers::{LocalObjectStore, MemoryObjectStore};

/// Build the object store named by `config.provider`.
pub async fn build_object_store(config: &StorageConfig) -> AppResult<Arc<dyn ObjectStore>> {
    info!(provider = %config.provider, bucket = %config.bucket, "Configuring object store");

    match config.provider.as_str() {
        "local" => Ok(Arc::new(
            LocalObjectStore::new(
                &config.local.root_path,
                &config.bucket,
                &config.local.public_base_url,
            )
            .await?,
        )),
        "memory" => Ok(Arc::new(MemoryObjectStore::new(&config.bucket))),
        #[cfg(feature = "s3")]
        "s3" => Ok(Arc::new(
            crate::providers::S3ObjectStore::new(&config.s3, &config.bucket).await?,
        )),
        #[cfg(not(feature = "s3"))]
        "s3" => Err(AppError::configuration(
            "Storage provider 's3' requires building with the `s3` feature",
        )),
        other => Err(AppError::configuration(format!(
            "Unknown storage provider '{other}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_provider_rejected() {
        let config = StorageConfig {
            provider: "ftp".to_string(),
            ..StorageConfig::default()
        };
        assert!(build_object_store(&config).await.is_err());
    }

    #[tokio::test]
    async fn test_memory_provider() {
        let config = StorageConfig {
            provider: "memory".to_string(),
            ..StorageConfig::default()
        };
        let store = build_object_store(&config).await.unwrap();
        assert_eq!(store.provider_type(), "memory");
        assert_eq!(store.bucket(), "recordings");
    }
}
