//! Scratch reaper against real directories.

use std::fs::{File, FileTimes};
use std::path::Path;
use std::time::{Duration, SystemTime};

use namecast_storage::{ActiveWorkDirs, ScratchSpace};
use namecast_worker::{BackgroundTasks, ScratchReaper};

use crate::helpers::TestApp;

const HOUR: Duration = Duration::from_secs(3600);

fn make_dir_aged(root: &Path, name: &str, hours: u32) -> std::path::PathBuf {
    let path = root.join(name);
    std::fs::create_dir_all(&path).unwrap();
    std::fs::write(path.join("source.webm"), b"bytes").unwrap();
    set_age(&path, hours);
    path
}

fn set_age(path: &Path, hours: u32) {
    let when = SystemTime::now() - HOUR * hours;
    File::open(path)
        .unwrap()
        .set_times(FileTimes::new().set_modified(when))
        .unwrap();
}

#[tokio::test]
async fn test_reaper_respects_age_threshold() {
    let root = tempfile::tempdir().unwrap();
    let young = make_dir_aged(root.path(), "job-20260101000000-young-0a0b0c0d", 23);
    let old = make_dir_aged(root.path(), "job-20260101000000-old-1a1b1c1d", 25);

    let space = ScratchSpace::new(root.path(), "job", ActiveWorkDirs::new());
    let reaper = ScratchReaper::new(space, 24 * HOUR);
    let report = reaper.sweep(root.path(), 24 * HOUR).await.unwrap();

    assert_eq!(report.candidates, 2);
    assert_eq!(report.removed, 1);
    assert!(young.exists());
    assert!(!old.exists());
}

#[tokio::test]
async fn test_reaper_skips_directories_of_running_jobs() {
    let app = TestApp::new().await;
    let scratch = app.service.scratch().clone();

    let live = scratch.create_work_dir("live").await.unwrap();
    set_age(live.path(), 48);
    let orphan = make_dir_aged(&app.scratch_root, "job-20250101000000-gone-deadbeef", 48);

    let reaper = ScratchReaper::new(scratch, 24 * HOUR);
    let report = reaper.sweep_now().await.unwrap();
    assert_eq!(report.removed, 1);
    assert_eq!(report.skipped_active, 1);
    assert!(live.path().exists());
    assert!(!orphan.exists());

    let path = live.path().to_path_buf();
    drop(live);
    let report = reaper.sweep_now().await.unwrap();
    assert_eq!(report.removed, 1);
    assert!(!path.exists());
}

#[tokio::test]
async fn test_background_tasks_sweep_at_start() {
    let app = TestApp::new().await;
    let orphan = make_dir_aged(&app.scratch_root, "job-20250101000000-old-cafebabe", 30);

    let tasks = BackgroundTasks::start(&app.service, &app.config);
    assert_eq!(tasks.len(), 2);

    for _ in 0..100 {
        if !orphan.exists() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(!orphan.exists());

    tasks.stop().await;
}
