//! Store health and in-flight jobs.

use tabled::Tabled;

use namecast_core::config::AppConfig;
use namecast_core::error::AppError;
use namecast_service::ServiceStatus;

use crate::output::{self, OutputFormat};

#[derive(Tabled)]
struct HealthRow {
    #[tabled(rename = "Store")]
    store: &'static str,
    #[tabled(rename = "Backend")]
    backend: String,
    #[tabled(rename = "Healthy")]
    healthy: String,
}

fn health_rows(status: &ServiceStatus) -> Vec<HealthRow> {
    let mark = |ok: bool| if ok { "yes" } else { "NO" }.to_string();
    vec![
        HealthRow {
            store: "objects",
            backend: status.object_store.backend.clone(),
            healthy: mark(status.object_store.healthy),
        },
        HealthRow {
            store: "records",
            backend: status.record_store.backend.clone(),
            healthy: mark(status.record_store.healthy),
        },
    ]
}

/// Execute the status command
pub async fn execute(config: &AppConfig, format: OutputFormat) -> Result<(), AppError> {
    let service = super::build_service(config).await?;
    let status = service.status().await;

    output::print_rows(&health_rows(&status), &status, format);
    if format == OutputFormat::Table {
        output::print_kv("Open upload sessions", &status.open_sessions.to_string());
        output::print_kv("Active jobs", &status.active_jobs.len().to_string());
        output::print_kv("Scratch root", &config.scratch.root);
    }
    Ok(())
}
