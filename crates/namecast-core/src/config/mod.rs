//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section. Every field carries a serde default so an empty file yields a
//! working local setup.

pub mod database;
pub mod ingest;
pub mod logging;
pub mod media;
pub mod publish;
pub mod scratch;
pub mod storage;

use serde::{Deserialize, Serialize};
use validator::Validate;

pub use self::database::DatabaseConfig;
pub use self::ingest::IngestConfig;
pub use self::logging::LoggingConfig;
pub use self::media::MediaConfig;
pub use self::publish::PublishConfig;
pub use self::scratch::ScratchConfig;
pub use self::storage::{LocalStorageConfig, S3StorageConfig, StorageConfig};

use crate::error::AppError;

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (default.toml + environment overlay).
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct AppConfig {
    /// Chunk receipt and finalize settings.
    #[serde(default)]
    #[validate(nested)]
    pub ingest: IngestConfig,
    /// External transcoding tool settings.
    #[serde(default)]
    #[validate(nested)]
    pub media: MediaConfig,
    /// Object upload settings.
    #[serde(default)]
    #[validate(nested)]
    pub publish: PublishConfig,
    /// Object storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Scratch directory and reaper settings.
    #[serde(default)]
    #[validate(nested)]
    pub scratch: ScratchConfig,
    /// Record store connection settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges `config/default`, an environment-specific overlay, and
    /// environment variables prefixed with `NAMECAST__`.
    pub fn load(env: &str) -> Result<Self, AppError> {
        Self::load_from("config/default", env)
    }

    /// Load configuration starting from an explicit base file.
    pub fn load_from(base: &str, env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(base).required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("NAMECAST")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let app: AppConfig = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;

        app.validate()?;
        Ok(app)
    }
}
