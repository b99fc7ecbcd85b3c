//! CLI command definitions and dispatch.

pub mod config;
pub mod ingest;
pub mod status;
pub mod sweep;

use clap::{Parser, Subcommand};

use namecast_core::config::AppConfig;
use namecast_core::error::AppError;
use namecast_service::IngestService;

use crate::output::OutputFormat;

/// Namecast: chunked media ingestion and HLS publishing
#[derive(Debug, Parser)]
#[command(name = "namecast", version, about, long_about = None)]
pub struct Cli {
    /// Base configuration file, without extension
    #[arg(short, long, default_value = "config/default")]
    pub config: String,

    /// Environment overlay loaded from `config/{env}`
    #[arg(short, long, env = "NAMECAST_ENV", default_value = "development")]
    pub env: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Upload a local file in chunks and finalize it into a published asset
    Ingest(ingest::IngestArgs),
    /// Remove orphaned scratch directories once
    Sweep(sweep::SweepArgs),
    /// Show store health and in-flight jobs
    Status,
    /// Configuration inspection
    Config(config::ConfigArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self, config: AppConfig) -> Result<(), AppError> {
        match &self.command {
            Commands::Ingest(args) => ingest::execute(args, &config, self.format).await,
            Commands::Sweep(args) => sweep::execute(args, &config, self.format).await,
            Commands::Status => status::execute(&config, self.format).await,
            Commands::Config(args) => config::execute(args, &config),
        }
    }
}

/// Helper: build the ingest service against the configured stores.
pub async fn build_service(config: &AppConfig) -> Result<IngestService, AppError> {
    let objects = namecast_storage::build_object_store(&config.storage).await?;
    let records = namecast_database::connect_record_store(&config.database).await?;
    let service = IngestService::new(config, objects, records);
    service.bootstrap().await?;
    Ok(service)
}
