//! Object storage configuration.

use serde::{Deserialize, Serialize};

/// Top-level object storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Backend to use: `"local"`, `"memory"`, or `"s3"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Bucket that receives published assets.
    #[serde(default = "default_bucket")]
    pub bucket: String,
    /// Local filesystem backend configuration.
    #[serde(default)]
    pub local: LocalStorageConfig,
    /// S3-compatible backend configuration.
    #[serde(default)]
    pub s3: S3StorageConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            bucket: default_bucket(),
            local: LocalStorageConfig::default(),
            s3: S3StorageConfig::default(),
        }
    }
}

/// Local filesystem object storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalStorageConfig {
    /// Root path holding one directory per bucket.
    #[serde(default = "default_local_root")]
    pub root_path: String,
    /// Base URL the local objects are served from, used for playback URLs.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
}

impl Default for LocalStorageConfig {
    fn default() -> Self {
        Self {
            root_path: default_local_root(),
            public_base_url: default_public_base_url(),
        }
    }
}

/// S3-compatible object storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3StorageConfig {
    /// S3 endpoint URL (for non-AWS services like MinIO).
    #[serde(default)]
    pub endpoint: String,
    /// AWS region.
    #[serde(default = "default_region")]
    pub region: String,
    /// Access key ID.
    #[serde(default)]
    pub access_key: String,
    /// Secret access key.
    #[serde(default)]
    pub secret_key: String,
}

impl Default for S3StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            region: default_region(),
            access_key: String::new(),
            secret_key: String::new(),
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}

fn default_bucket() -> String {
    "recordings".to_string()
}

fn default_local_root() -> String {
    "./data/objects".to_string()
}

fn default_public_base_url() -> String {
    "http://localhost:8080/media".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}
