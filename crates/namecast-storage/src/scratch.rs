//! Job scratch directories.
//!
//! Every job gets one directory under the scratch root named
//! `{prefix}-{YYYYmmddHHMMSS}-{upload id}-{random}`. Removing it removes
//! everything the job wrote. While a job runs its directory name is held in
//! [`ActiveWorkDirs`], which the reaper consults before deleting anything.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashSet;
use tracing::{debug, warn};
use uuid::Uuid;

use namecast_core::error::{AppError, ErrorKind};
use namecast_core::result::AppResult;

/// Longest upload-id fragment embedded in a directory name.
const MAX_ID_FRAGMENT: usize = 32;

/// Names of the work directories belonging to running jobs.
#[derive(Debug, Clone, Default)]
pub struct ActiveWorkDirs {
    names: Arc<DashSet<String>>,
}

impl ActiveWorkDirs {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the directory name belongs to a running job.
    pub fn contains(&self, dir_name: &str) -> bool {
        self.names.contains(dir_name)
    }

    /// Number of registered directories.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether no directory is registered.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    fn register(&self, dir_name: &str) {
        self.names.insert(dir_name.to_string());
    }

    fn release(&self, dir_name: &str) {
        self.names.remove(dir_name);
    }
}

/// Factory for job directories under one scratch root.
#[derive(Debug, Clone)]
pub struct ScratchSpace {
    root: PathBuf,
    prefix: String,
    active: ActiveWorkDirs,
}

impl ScratchSpace {
    /// Create a scratch space rooted at `root`.
    pub fn new(root: impl Into<PathBuf>, prefix: impl Into<String>, active: ActiveWorkDirs) -> Self {
        Self {
            root: root.into(),
            prefix: prefix.into(),
            active,
        }
    }

    /// Scratch root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory name prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Registry of running jobs' directories.
    pub fn active(&self) -> &ActiveWorkDirs {
        &self.active
    }

    /// Whether `dir_name` follows this space's naming convention.
    pub fn owns_name(&self, dir_name: &str) -> bool {
        dir_name
            .strip_prefix(self.prefix.as_str())
            .is_some_and(|rest| rest.starts_with('-'))
    }

    /// Create a fresh, uniquely named directory for one job and register it
    /// as active.
    pub async fn create_work_dir(&self, upload_id: &str) -> AppResult<WorkDir> {
        let name = format!(
            "{}-{}-{}-{}",
            self.prefix,
            Utc::now().format("%Y%m%d%H%M%S"),
            sanitize_fragment(upload_id),
            &Uuid::new_v4().simple().to_string()[..8]
        );
        let path = self.root.join(&name);

        tokio::fs::create_dir_all(&path).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create work directory {}", path.display()),
                e,
            )
        })?;

        self.active.register(&name);
        debug!(path = %path.display(), "Created work directory");

        Ok(WorkDir {
            path,
            name,
            active: self.active.clone(),
        })
    }
}

/// A job's scratch directory.
///
/// The directory stays registered as active until the handle is dropped.
#[derive(Debug)]
pub struct WorkDir {
    path: PathBuf,
    name: String,
    active: ActiveWorkDirs,
}

impl WorkDir {
    /// Full path of the directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory name under the scratch root.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Remove the directory and everything in it.
    ///
    /// Failure is logged and otherwise ignored; the reaper picks up whatever
    /// is left once the handle is dropped.
    pub async fn remove(&self) -> bool {
        match tokio::fs::remove_dir_all(&self.path).await {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to remove work directory");
                false
            }
        }
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        self.active.release(&self.name);
    }
}

/// Keep `[A-Za-z0-9_]`, map everything else to `_`, cap the length.
fn sanitize_fragment(upload_id: &str) -> String {
    let cleaned: String = upload_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .take(MAX_ID_FRAGMENT)
        .collect();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_work_dir_lifecycle() {
        let root = tempfile::tempdir().unwrap();
        let space = ScratchSpace::new(root.path(), "job", ActiveWorkDirs::new());

        let dir = space.create_work_dir("abc/../x").await.unwrap();
        assert!(dir.path().is_dir());
        assert!(dir.name().starts_with("job-"));
        assert!(dir.name().contains("-abc____x-"));
        assert!(space.owns_name(dir.name()));
        assert!(space.active().contains(dir.name()));

        let name = dir.name().to_string();
        assert!(dir.remove().await);
        assert!(!dir.path().exists());
        drop(dir);
        assert!(!space.active().contains(&name));
    }

    #[tokio::test]
    async fn test_names_are_unique() {
        let root = tempfile::tempdir().unwrap();
        let space = ScratchSpace::new(root.path(), "job", ActiveWorkDirs::new());
        let a = space.create_work_dir("same").await.unwrap();
        let b = space.create_work_dir("same").await.unwrap();
        assert_ne!(a.path(), b.path());
        assert_eq!(space.active().len(), 2);
    }

    #[test]
    fn test_owns_name() {
        let space = ScratchSpace::new("/tmp", "job", ActiveWorkDirs::new());
        assert!(space.owns_name("job-20260101000000-abc-1234abcd"));
        assert!(!space.owns_name("jobless"));
        assert!(!space.owns_name("other-20260101000000"));
    }
}
