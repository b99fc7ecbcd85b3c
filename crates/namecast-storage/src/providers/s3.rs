//! S3-compatible object store (requires the `s3` feature).

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream as S3Body;
use bytes::Bytes;
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

use namecast_core::config::S3StorageConfig;
use namecast_core::error::{AppError, ErrorKind};
use namecast_core::result::AppResult;
use namecast_core::traits::{ByteStream, ObjectMeta, ObjectStore};

/// Object store talking to S3 or an S3-compatible service such as MinIO.
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    region: String,
}

impl S3ObjectStore {
    /// Build a client from configuration.
    ///
    /// Static credentials are used when both keys are set; otherwise the
    /// default AWS credential chain applies. A custom endpoint switches to
    /// path-style addressing.
    pub async fn new(config: &S3StorageConfig, bucket: &str) -> AppResult<Self> {
        info!(
            endpoint = %config.endpoint,
            region = %config.region,
            bucket,
            "Initializing S3 object store"
        );

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));
        if !config.access_key.is_empty() && !config.secret_key.is_empty() {
            loader = loader.credentials_provider(Credentials::new(
                &config.access_key,
                &config.secret_key,
                None,
                None,
                "namecast",
            ));
        }
        let sdk_config = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if !config.endpoint.is_empty() {
            builder = builder.endpoint_url(&config.endpoint).force_path_style(true);
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket: bucket.to_string(),
            region: config.region.clone(),
        })
    }
}

fn s3_error(message: String, err: impl std::error::Error + Send + Sync + 'static) -> AppError {
    AppError::with_source(ErrorKind::Storage, message, err)
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn provider_type(&self) -> &str {
        "s3"
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(self.client.list_buckets().send().await.is_ok())
    }

    async fn bucket_exists(&self) -> AppResult<bool> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => Ok(false),
            Err(e) => Err(s3_error(format!("Failed to check bucket '{}'", self.bucket), e)),
        }
    }

    async fn create_bucket(&self) -> AppResult<()> {
        self.client
            .create_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| s3_error(format!("Failed to create bucket '{}'", self.bucket), e))?;
        info!(bucket = %self.bucket, region = %self.region, "Created bucket");
        Ok(())
    }

    async fn put_object(&self, key: &str, data: Bytes, content_type: &str) -> AppResult<()> {
        let len = data.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(S3Body::from(data))
            .send()
            .await
            .map_err(|e| s3_error(format!("Failed to put object '{key}'"), e))?;
        debug!(key, bytes = len, "Stored object");
        Ok(())
    }

    async fn get_object(&self, key: &str) -> AppResult<ByteStream> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    AppError::not_found(format!("Object not found: {key}"))
                } else {
                    s3_error(format!("Failed to get object '{key}'"), e)
                }
            })?;
        Ok(Box::pin(ReaderStream::new(output.body.into_async_read())))
    }

    async fn head_object(&self, key: &str) -> AppResult<Option<ObjectMeta>> {
        match self.client.head_object().bucket(&self.bucket).key(key).send().await {
            Ok(output) => Ok(Some(ObjectMeta {
                key: key.to_string(),
                size_bytes: output.content_length().unwrap_or(0).max(0) as u64,
                content_type: output.content_type().map(str::to_string),
            })),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => Ok(None),
            Err(e) => Err(s3_error(format!("Failed to head object '{key}'"), e)),
        }
    }

    async fn delete_object(&self, key: &str) -> AppResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| s3_error(format!("Failed to delete object '{key}'"), e))?;
        Ok(())
    }

    async fn presigned_url(&self, key: &str, expires_in: Duration) -> AppResult<String> {
        let presign = PresigningConfig::expires_in(expires_in)
            .map_err(|e| s3_error("Invalid presign expiry".to_string(), e))?;
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presign)
            .await
            .map_err(|e| s3_error(format!("Failed to presign '{key}'"), e))?;
        Ok(request.uri().to_string())
    }
}
