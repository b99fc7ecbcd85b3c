//! End-to-end finalize behavior.

use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::mpsc;

use namecast_core::error::ErrorKind;
use namecast_core::traits::ObjectStore;
use namecast_entity::{JobStage, MediaKind, PublishedAsset, Recording};
use namecast_service::FinalizeRequest;

use crate::helpers::{self, TestApp, TestOptions, ToolMode};

#[tokio::test]
async fn test_three_chunk_upload_is_published_and_recorded() {
    let app = TestApp::new().await;
    app.upload("abc", 42, &[400 * 1024, 400 * 1024, 113 * 1024]);

    let (tx, mut rx) = mpsc::channel(64);
    let outcome = app
        .service
        .finalize_with_progress(helpers::video("abc"), Some(tx))
        .await
        .expect("finalize succeeds");

    let manifest = PublishedAsset::manifest_key(MediaKind::Video, 42, outcome.job_id);
    assert_eq!(outcome.record_id, 42);
    assert_eq!(outcome.asset.manifest_object_key, manifest);
    assert_eq!(outcome.asset.segment_object_keys.len(), 3);
    assert!(outcome.commit.is_complete());

    let record = app.record(42).await;
    assert!(record.is_recorded);
    assert!(record.recorded_at.is_some());
    assert_eq!(record.processed_video_path.as_deref(), Some(manifest.as_str()));
    assert!(record.processed_audio_path.is_none());

    let keys = app.objects.keys();
    assert_eq!(keys.len(), 4);
    assert!(keys.contains(&format!("video/42/{}/segment_002.ts", outcome.job_id)));

    let mut samples = Vec::new();
    while let Ok(sample) = rx.try_recv() {
        samples.push(sample);
    }
    assert!(!samples.is_empty());
    assert!(samples.iter().any(|s| s.fraction.is_some()));

    assert!(app.scratch_entries().is_empty());
    assert!(app.service.job_status("abc").is_none());
    assert!(app.service.scratch().active().is_empty());

    let url = app.service.playback_url(&outcome.asset).await.unwrap();
    assert!(url.contains(&manifest));
}

#[tokio::test]
async fn test_audio_asset_uses_audio_path() {
    let app = TestApp::new().await;
    app.upload("voice", 42, &[2048]);

    let outcome = app
        .service
        .finalize(FinalizeRequest {
            upload_id: "voice".to_string(),
            media_kind: MediaKind::Audio,
        })
        .await
        .unwrap();

    let manifest = PublishedAsset::manifest_key(MediaKind::Audio, 42, outcome.job_id);
    assert_eq!(outcome.asset.manifest_object_key, manifest);
    let record = app.record(42).await;
    assert_eq!(record.processed_audio_path.as_deref(), Some(manifest.as_str()));
    assert!(record.processed_video_path.is_none());
}

#[tokio::test]
async fn test_finalized_upload_cannot_be_finalized_again() {
    let app = TestApp::new().await;
    app.upload("abc", 42, &[1024]);
    app.service.finalize(helpers::video("abc")).await.unwrap();

    let err = app.service.finalize(helpers::video("abc")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownUploadSession);
    assert!(err.job_id.is_none());
}

#[tokio::test]
async fn test_transcode_failure_rolls_back_and_cleans_up() {
    let app = TestApp::with_options(TestOptions {
        transcode: ToolMode::Fail,
        ..TestOptions::default()
    })
    .await;
    app.upload("abc", 42, &[4096, 4096]);

    let err = app.service.finalize(helpers::video("abc")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TranscodeFailed);
    assert_eq!(err.stage, Some(JobStage::Transcoding));
    assert!(err.job_id.is_some());
    assert!(err.source.message.contains("Error initializing output stream"));

    let record = app.record(42).await;
    assert!(!record.is_recorded);
    assert!(record.processed_video_path.is_none());
    assert!(app.objects.keys().is_empty());
    assert!(app.scratch_entries().is_empty());

    let payload = err.payload();
    assert_eq!(payload.kind, ErrorKind::TranscodeFailed);
    assert_eq!(payload.stage, Some(JobStage::Transcoding));
}

#[tokio::test]
async fn test_remux_failure_rolls_back() {
    let app = TestApp::with_options(TestOptions {
        remux: ToolMode::Fail,
        ..TestOptions::default()
    })
    .await;
    app.upload("abc", 42, &[4096]);

    let err = app.service.finalize(helpers::video("abc")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RemuxFailed);
    assert_eq!(err.stage, Some(JobStage::Remuxing));
    assert!(!app.record(42).await.is_recorded);
    assert!(app.scratch_entries().is_empty());
}

#[tokio::test]
async fn test_remux_hang_is_killed_at_timeout() {
    let app = TestApp::with_options(TestOptions {
        remux: ToolMode::Hang,
        ..TestOptions::default()
    })
    .await;
    app.upload("abc", 42, &[4096]);

    let started = Instant::now();
    let err = app.service.finalize(helpers::video("abc")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RemuxFailed);
    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(app.scratch_entries().is_empty());
}

#[tokio::test]
async fn test_silent_transcode_times_out() {
    let app = TestApp::with_options(TestOptions {
        transcode: ToolMode::Hang,
        stall_timeout_seconds: 1,
        ..TestOptions::default()
    })
    .await;
    app.upload("abc", 42, &[4096]);

    let started = Instant::now();
    let err = app.service.finalize(helpers::video("abc")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TranscodeTimedOut);
    assert_eq!(err.stage, Some(JobStage::Transcoding));
    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(!app.record(42).await.is_recorded);
    assert!(app.scratch_entries().is_empty());
}

#[tokio::test]
async fn test_failure_keeps_previously_recorded_record() {
    for (remux, transcode, kind) in [
        (ToolMode::Fail, ToolMode::Succeed, ErrorKind::RemuxFailed),
        (ToolMode::Succeed, ToolMode::Fail, ErrorKind::TranscodeFailed),
    ] {
        let app = TestApp::with_options(TestOptions {
            remux,
            transcode,
            ..TestOptions::default()
        })
        .await;
        let earlier_path = "video/42/earlier/manifest.m3u8";
        let mut earlier = Recording::new(42, "Ada Lovelace");
        earlier.apply_commit(MediaKind::Video, earlier_path, chrono::Utc::now());
        app.records.insert(earlier.clone());
        app.objects
            .put_object(earlier_path, Bytes::from_static(b"#EXTM3U\n"), "application/vnd.apple.mpegurl")
            .await
            .unwrap();
        app.upload("again", 42, &[4096]);

        let err = app.service.finalize(helpers::video("again")).await.unwrap_err();
        assert_eq!(err.kind(), kind);

        assert_eq!(app.record(42).await, earlier);
        assert_eq!(app.objects.keys(), vec![earlier_path.to_string()]);
        assert!(app.scratch_entries().is_empty());
    }
}

#[tokio::test]
async fn test_racing_finalizes_for_one_record_keep_the_winner() {
    let app = TestApp::new().await;
    app.upload("a", 42, &[4096]);
    app.upload("b", 42, &[4096]);

    let (first, second) = tokio::join!(
        app.service.finalize(helpers::video("a")),
        app.service.finalize(helpers::video("b")),
    );

    let (winner, loser) = match (first, second) {
        (Ok(won), Err(lost)) | (Err(lost), Ok(won)) => (won, lost),
        (first, second) => panic!("expected one winner, got {first:?} and {second:?}"),
    };
    assert_eq!(loser.kind(), ErrorKind::CommitFailed);
    assert_eq!(loser.stage, Some(JobStage::Committing));

    let record = app.record(42).await;
    assert!(record.is_recorded);
    assert_eq!(record.recorded_at, Some(winner.commit.committed_at));
    assert_eq!(
        record.processed_video_path.as_deref(),
        Some(winner.asset.manifest_object_key.as_str())
    );

    let mut keys = app.objects.keys();
    keys.sort();
    let mut expected: Vec<String> = winner.asset.all_keys().map(str::to_string).collect();
    expected.sort();
    assert_eq!(keys, expected);
    assert!(app.scratch_entries().is_empty());
}

#[tokio::test]
async fn test_commit_finishing_after_deadline_is_undone() {
    let app = TestApp::with_options(TestOptions {
        finalize_timeout_seconds: 1,
        commit_delay: Duration::from_secs(2),
        ..TestOptions::default()
    })
    .await;
    app.upload("abc", 42, &[4096]);

    let err = app.service.finalize(helpers::video("abc")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FinalizeTimedOut);
    assert_eq!(err.stage, Some(JobStage::Committing));

    app.wait_idle("abc").await;
    let record = app.record(42).await;
    assert!(!record.is_recorded);
    assert!(record.recorded_at.is_none());
    assert!(record.processed_video_path.is_none());
    assert!(app.objects.keys().is_empty());
    assert!(app.scratch_entries().is_empty());
}

#[tokio::test]
async fn test_concurrent_finalize_rejected_and_overall_timeout() {
    let app = TestApp::with_options(TestOptions {
        transcode: ToolMode::Crawl,
        stall_timeout_seconds: 30,
        finalize_timeout_seconds: 2,
        ..TestOptions::default()
    })
    .await;
    app.upload("abc", 42, &[4096]);

    let service = app.service.clone();
    let started = Instant::now();
    let first = tokio::spawn(async move { service.finalize(helpers::video("abc")).await });

    let mut seen_transcoding = false;
    for _ in 0..100 {
        if let Some(status) = app.service.job_status("abc") {
            if status.stage == JobStage::Transcoding {
                seen_transcoding = true;
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(seen_transcoding);

    let err = app.service.finalize(helpers::video("abc")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FinalizeInProgress);

    let err = app
        .service
        .receive_chunk(helpers::chunk("abc", 0, 1, 42, 16))
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::FinalizeInProgress);

    let status = app.service.status().await;
    assert_eq!(status.active_jobs.len(), 1);
    assert_eq!(status.active_jobs[0].record_id, 42);

    let err = first.await.unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FinalizeTimedOut);
    assert!(err.job_id.is_some());
    assert!(started.elapsed() < Duration::from_secs(10));

    app.wait_idle("abc").await;
    assert!(!app.record(42).await.is_recorded);
    assert!(app.scratch_entries().is_empty());
    assert!(app.objects.keys().is_empty());
}

#[tokio::test]
async fn test_chunk_validation_errors() {
    let app = TestApp::new().await;
    let svc = &app.service;

    svc.receive_chunk(helpers::chunk("abc", 0, 3, 42, 16)).unwrap();

    let err = svc.receive_chunk(helpers::chunk("abc", 1, 4, 42, 16)).unwrap_err();
    assert_eq!(err.kind, ErrorKind::SessionMismatch);

    let err = svc.receive_chunk(helpers::chunk("abc", 1, 3, 7, 16)).unwrap_err();
    assert_eq!(err.kind, ErrorKind::SessionMismatch);

    let err = svc.receive_chunk(helpers::chunk("abc", 3, 3, 42, 16)).unwrap_err();
    assert_eq!(err.kind, ErrorKind::ChunkIndexOutOfRange);

    let too_big = app.config.ingest.max_chunk_bytes + 1;
    let err = svc.receive_chunk(helpers::chunk("abc", 1, 3, 42, too_big)).unwrap_err();
    assert_eq!(err.kind, ErrorKind::ChunkTooLarge);

    let err = svc.receive_chunk(helpers::chunk("", 0, 1, 42, 16)).unwrap_err();
    assert_eq!(err.kind, ErrorKind::MissingField);

    let err = svc.receive_chunk(helpers::chunk("huge", 0, u32::MAX, 42, 16)).unwrap_err();
    assert_eq!(err.kind, ErrorKind::TooManyChunks);
    assert!(svc.chunk_store().progress("huge").is_err());

    let receipt = svc.receive_chunk(helpers::chunk("abc", 0, 3, 42, 16)).unwrap();
    assert_eq!(receipt.received_count, 1);
    assert!(!receipt.is_complete);

    let err = svc.finalize(helpers::video("abc")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IncompleteSession);
}
