//! HLS manifest inspection.

use std::path::{Path, PathBuf};

use crate::error::MediaError;

/// Segment references in playback order: every non-empty line that is not
/// a `#` tag.
pub fn segment_entries(manifest: &str) -> Vec<&str> {
    manifest
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .collect()
}

/// Read a manifest and resolve its segments to files next to it.
///
/// Fails when the manifest lists no segments, when an entry is not a
/// plain file name, or when a listed segment does not exist.
pub async fn read_segment_paths(manifest_path: &Path) -> Result<Vec<PathBuf>, MediaError> {
    let invalid = |reason: String| MediaError::InvalidManifest {
        path: manifest_path.to_path_buf(),
        reason,
    };

    let text = tokio::fs::read_to_string(manifest_path)
        .await
        .map_err(|e| invalid(format!("unreadable: {e}")))?;
    let dir = manifest_path
        .parent()
        .ok_or_else(|| invalid("manifest has no parent directory".to_string()))?;

    let entries = segment_entries(&text);
    if entries.is_empty() {
        return Err(invalid("no segments listed".to_string()));
    }

    let mut paths = Vec::with_capacity(entries.len());
    for entry in entries {
        let name = Path::new(entry);
        if name.components().count() != 1 || name.file_name().is_none() {
            return Err(invalid(format!("segment entry '{entry}' is not a plain file name")));
        }
        let path = dir.join(name);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(invalid(format!("segment '{entry}' does not exist")));
        }
        paths.push(path);
    }
    Ok(paths)
}
