//! End-to-end ingest of a local file.

use std::path::PathBuf;

use bytes::Bytes;
use clap::Args;
use tabled::Tabled;
use tokio::sync::mpsc;

use namecast_core::config::AppConfig;
use namecast_core::error::AppError;
use namecast_entity::MediaKind;
use namecast_media::TranscodeProgress;
use namecast_service::FinalizeRequest;
use namecast_storage::IncomingChunk;
use namecast_worker::BackgroundTasks;

use crate::output::{self, OutputFormat};

/// Arguments for the ingest command
#[derive(Debug, Args)]
pub struct IngestArgs {
    /// Path to the captured media file
    pub file: PathBuf,

    /// Record that receives the published asset
    #[arg(short, long)]
    pub record_id: i64,

    /// Kind of media to produce
    #[arg(short, long, default_value = "video")]
    pub kind: MediaKind,

    /// Chunk size in bytes; defaults to the configured maximum
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Name stored on the record when it has to be created
    #[arg(short, long)]
    pub name: Option<String>,

    /// Upload identifier; generated when omitted
    #[arg(long)]
    pub upload_id: Option<String>,
}

#[derive(Tabled)]
struct ObjectRow {
    #[tabled(rename = "Object key")]
    key: String,
}

/// Execute the ingest command
pub async fn execute(
    args: &IngestArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let service = super::build_service(config).await?;
    let tasks = BackgroundTasks::start(&service, config);

    let result = run(args, config, &service, format).await;
    tasks.stop().await;
    result
}

async fn run(
    args: &IngestArgs,
    config: &AppConfig,
    service: &namecast_service::IngestService,
    format: OutputFormat,
) -> Result<(), AppError> {
    let content = tokio::fs::read(&args.file).await.map_err(|e| {
        AppError::with_source(
            namecast_core::ErrorKind::NotFound,
            format!("Failed to read {}", args.file.display()),
            e,
        )
    })?;
    if content.is_empty() {
        return Err(AppError::validation(format!("{} is empty", args.file.display())));
    }

    let file_name = args
        .file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("capture")
        .to_string();
    let record_name = args.name.clone().unwrap_or_else(|| {
        args.file
            .file_stem()
            .and_then(|n| n.to_str())
            .unwrap_or("recording")
            .to_string()
    });
    service.records().store().ensure(args.record_id, &record_name).await?;

    let chunk_size = args
        .chunk_size
        .unwrap_or(config.ingest.max_chunk_bytes)
        .clamp(1, config.ingest.max_chunk_bytes);
    let upload_id = args
        .upload_id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());

    let content = Bytes::from(content);
    let total_chunks = content.len().div_ceil(chunk_size) as u32;
    println!(
        "Uploading '{}' ({} bytes) as {} chunk(s), upload id {}",
        file_name,
        content.len(),
        total_chunks,
        upload_id
    );

    for index in 0..total_chunks {
        let start = index as usize * chunk_size;
        let end = (start + chunk_size).min(content.len());
        service.receive_chunk(IncomingChunk {
            upload_id: upload_id.clone(),
            chunk_index: index,
            total_chunks,
            data: content.slice(start..end),
            owner_record_id: args.record_id,
            file_name: file_name.clone(),
        })?;
    }

    let (tx, mut rx) = mpsc::channel::<TranscodeProgress>(16);
    let printer = tokio::spawn(async move {
        while let Some(sample) = rx.recv().await {
            match sample.fraction {
                Some(f) => println!(
                    "  transcoding {:>5.1}%  speed {}",
                    f * 100.0,
                    sample.speed.map(|s| format!("{s:.2}x")).unwrap_or_else(|| "-".into())
                ),
                None => println!("  transcoding {:?} written", sample.out_time),
            }
        }
    });

    let outcome = service
        .finalize_with_progress(
            FinalizeRequest {
                upload_id,
                media_kind: args.kind,
            },
            Some(tx),
        )
        .await;
    let _ = printer.await;

    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(e) => {
            if format == OutputFormat::Json {
                output::print_json(&e.payload());
            }
            return Err(AppError::new(e.kind(), e.to_string()));
        }
    };

    let playback = service.playback_url(&outcome.asset).await;
    match format {
        OutputFormat::Json => output::print_json(&outcome),
        OutputFormat::Table => {
            output::print_success(&format!(
                "Recording {} published ({} segments)",
                outcome.record_id,
                outcome.asset.segment_object_keys.len()
            ));
            output::print_kv("Job", &outcome.job_id.to_string());
            output::print_kv("Manifest", &outcome.asset.manifest_object_key);
            match &playback {
                Ok(url) => output::print_kv("Playback URL", url),
                Err(e) => output::print_warning(&format!("No playback URL: {e}")),
            }
            let rows: Vec<ObjectRow> = outcome
                .asset
                .all_keys()
                .map(|key| ObjectRow { key: key.to_string() })
                .collect();
            output::print_rows(&rows, &outcome.asset, format);
        }
    }
    Ok(())
}
