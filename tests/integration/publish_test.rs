//! Publish failures inside a full finalize.

use namecast_core::error::ErrorKind;
use namecast_entity::JobStage;

use crate::helpers::{self, TestApp, TestOptions};

#[tokio::test]
async fn test_failed_segment_leaves_no_objects_behind() {
    let app = TestApp::with_options(TestOptions {
        segments: 10,
        publish_concurrency: 3,
        failing_suffix: Some("segment_003.ts".to_string()),
        ..TestOptions::default()
    })
    .await;
    app.upload("abc", 42, &[8192, 8192]);

    let err = app.service.finalize(helpers::video("abc")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PublishFailed);
    assert_eq!(err.stage, Some(JobStage::Publishing));

    let flaky = app.flaky.as_ref().unwrap();
    assert!(flaky.keys().is_empty(), "left behind: {:?}", flaky.keys());

    let record = app.record(42).await;
    assert!(!record.is_recorded);
    assert!(record.processed_video_path.is_none());
    assert!(app.scratch_entries().is_empty());
}

#[tokio::test]
async fn test_retry_exhaustion_names_key_and_attempt() {
    let app = TestApp::with_options(TestOptions {
        segments: 2,
        publish_attempts: 3,
        failing_suffix: Some("segment_001.ts".to_string()),
        ..TestOptions::default()
    })
    .await;
    app.upload("abc", 42, &[1024]);

    let err = app.service.finalize(helpers::video("abc")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PublishFailed);
    let prefix = format!("video/42/{}", err.job_id.unwrap());
    let segment_key = format!("{prefix}/segment_001.ts");
    assert!(err.source.message.contains(&segment_key));
    assert!(err.source.message.contains("attempt 3/3"));

    let flaky = app.flaky.as_ref().unwrap();
    assert_eq!(*flaky.attempts.get(&segment_key).unwrap(), 3);
    assert_eq!(*flaky.attempts.get(&format!("{prefix}/manifest.m3u8")).unwrap(), 1);
}

#[tokio::test]
async fn test_manifest_failure_stops_before_segments() {
    let app = TestApp::with_options(TestOptions {
        segments: 4,
        publish_attempts: 2,
        failing_suffix: Some("manifest.m3u8".to_string()),
        ..TestOptions::default()
    })
    .await;
    app.upload("abc", 42, &[1024]);

    let err = app.service.finalize(helpers::video("abc")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PublishFailed);

    let flaky = app.flaky.as_ref().unwrap();
    assert!(flaky.attempts.iter().all(|e| e.key().ends_with("manifest.m3u8")));
    assert!(flaky.keys().is_empty());
}
