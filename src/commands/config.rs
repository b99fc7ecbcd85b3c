//! Configuration inspection CLI commands.

use clap::{Args, Subcommand};

use namecast_core::config::AppConfig;
use namecast_core::error::AppError;
use namecast_database::mask_password;

use crate::output;

/// Arguments for config commands
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration as JSON
    Show,
    /// Check that the configuration loads and validates
    Validate,
}

/// Execute config commands
pub fn execute(args: &ConfigArgs, config: &AppConfig) -> Result<(), AppError> {
    match &args.command {
        ConfigCommand::Show => output::print_json(&redacted(config)),
        ConfigCommand::Validate => {
            output::print_success("Configuration is valid");
            output::print_kv("Storage", &format!("{} ({})", config.storage.provider, config.storage.bucket));
            output::print_kv(
                "Database",
                if config.database.is_configured() {
                    "postgres"
                } else {
                    "in-memory"
                },
            );
            output::print_kv("Transcoder", &config.media.ffmpeg_path);
            output::print_kv("Scratch root", &config.scratch.root);
        }
    }
    Ok(())
}

/// Copy of `config` with credentials masked.
fn redacted(config: &AppConfig) -> AppConfig {
    let mut config = config.clone();
    config.database.url = mask_password(&config.database.url);
    if !config.storage.s3.secret_key.is_empty() {
        config.storage.s3.secret_key = "****".to_string();
    }
    config
}
