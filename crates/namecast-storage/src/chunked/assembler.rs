//! Reassembler: writes a complete chunk set into one file.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::{error, info};

use namecast_core::error::{AppError, ErrorKind};
use namecast_core::result::AppResult;

use super::session::UploadSession;

/// Base name of the reassembled source inside a job directory.
const SOURCE_STEM: &str = "source";

/// Concatenates chunk slots in index order into a single file.
#[derive(Debug, Clone, Default)]
pub struct Reassembler;

impl Reassembler {
    /// Create a new reassembler.
    pub fn new() -> Self {
        Self
    }

    /// Write the session's bytes to `source.<ext>` inside `dir`.
    ///
    /// `dir` must already exist. The session's bytes are left in place;
    /// releasing them is up to the caller.
    pub async fn assemble(&self, session: &UploadSession, dir: &Path) -> AppResult<PathBuf> {
        if !session.is_complete() {
            let missing = session.missing_indices();
            error!(
                upload_id = session.upload_id(),
                ?missing,
                "Reassembly reached with an incomplete chunk set"
            );
            return Err(AppError::new(
                ErrorKind::IncompleteSession,
                format!(
                    "Upload '{}' is missing chunks {missing:?}",
                    session.upload_id()
                ),
            ));
        }

        let target = dir.join(source_file_name(session.file_name()));
        let mut file = tokio::fs::File::create(&target).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create {}", target.display()),
                e,
            )
        })?;

        let mut total_bytes = 0u64;
        for chunk in session.slots().iter().flatten() {
            file.write_all(chunk).await.map_err(|e| {
                AppError::with_source(ErrorKind::Storage, "Failed to write chunk to source file", e)
            })?;
            total_bytes += chunk.len() as u64;
        }

        file.flush()
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Storage, "Failed to flush source file", e))?;

        info!(
            upload_id = session.upload_id(),
            chunks = session.total_chunks(),
            bytes = total_bytes,
            path = %target.display(),
            "Reassembled upload"
        );

        Ok(target)
    }
}

/// `source.<ext>` keeping a short alphanumeric extension from the client name.
fn source_file_name(client_name: &str) -> String {
    let ext = Path::new(client_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 8 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_else(|| "bin".to_string());
    format!("{SOURCE_STEM}.{ext}")
}
