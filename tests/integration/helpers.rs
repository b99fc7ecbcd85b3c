//! Shared test helpers for integration tests.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tempfile::TempDir;

use namecast_core::config::AppConfig;
use namecast_core::error::AppError;
use namecast_core::result::AppResult;
use namecast_core::traits::{ByteStream, ObjectMeta, ObjectStore};
use namecast_database::{MemoryRecordRepository, RecordStore};
use namecast_entity::{MediaKind, RecordedState, Recording};
use namecast_service::{FinalizeRequest, IngestService};
use namecast_storage::IncomingChunk;
use namecast_storage::providers::MemoryObjectStore;

/// How one phase of the fake transcoding tool behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolMode {
    /// Produce the expected output and exit 0.
    Succeed,
    /// Print a diagnostic and exit 1.
    Fail,
    /// Go silent until killed.
    Hang,
    /// Keep printing progress until killed.
    Crawl,
}

impl ToolMode {
    fn as_str(self) -> &'static str {
        match self {
            Self::Succeed => "succeed",
            Self::Fail => "fail",
            Self::Hang => "hang",
            Self::Crawl => "crawl",
        }
    }
}

/// Knobs for building a [`TestApp`].
#[derive(Debug, Clone)]
pub struct TestOptions {
    pub remux: ToolMode,
    pub transcode: ToolMode,
    pub segments: u32,
    pub finalize_timeout_seconds: u64,
    pub stall_timeout_seconds: u64,
    pub publish_attempts: u32,
    pub publish_concurrency: usize,
    /// Segment keys ending with this suffix fail every upload attempt.
    pub failing_suffix: Option<String>,
    /// Extra time every commit spends in the record store.
    pub commit_delay: Duration,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            remux: ToolMode::Succeed,
            transcode: ToolMode::Succeed,
            segments: 3,
            finalize_timeout_seconds: 30,
            stall_timeout_seconds: 5,
            publish_attempts: 3,
            publish_concurrency: 5,
            failing_suffix: None,
            commit_delay: Duration::ZERO,
        }
    }
}

/// Fake ffmpeg: copies the input for a remux, writes an HLS manifest plus
/// segments for a transcode. Placeholders are filled per test.
const FAKE_TOOL: &str = r##"#!/bin/sh
input=""
prev=""
last=""
phase=""
for arg in "$@"; do
  if [ "$prev" = "-i" ]; then input="$arg"; fi
  case "$arg" in
    matroska) phase=remux ;;
    hls) phase=transcode ;;
  esac
  prev="$arg"
  last="$arg"
done

if [ "$phase" = remux ]; then
  case "@REMUX@" in
    fail) echo "$input: Invalid data found when processing input" >&2; exit 1 ;;
    hang) sleep 60; exit 0 ;;
  esac
  cp "$input" "$last"
  exit 0
fi

dir=$(dirname "$last")
total=$((@SEGMENTS@ * 10))
echo "  Duration: 00:$(printf '%02d' $((total / 60))):$(printf '%02d' $((total % 60))).00, start: 0.000000, bitrate: 900 kb/s" >&2
case "@TRANSCODE@" in
  fail) echo "Error initializing output stream 0:0" >&2; exit 1 ;;
  hang) sleep 60; exit 0 ;;
  crawl)
    while true; do
      echo "frame=   30 fps=30 q=28.0 size=     256kB time=00:00:01.00 bitrate= 800.0kbits/s speed=1.00x" >&2
      sleep 0.2
    done ;;
esac

{
  echo "#EXTM3U"
  echo "#EXT-X-VERSION:3"
  echo "#EXT-X-TARGETDURATION:10"
  echo "#EXT-X-PLAYLIST-TYPE:VOD"
} > "$last"
i=0
while [ "$i" -lt @SEGMENTS@ ]; do
  name=$(printf 'segment_%03d.ts' "$i")
  printf 'segment %d of %s' "$i" "$input" > "$dir/$name"
  printf '#EXTINF:10.000000,\n%s\n' "$name" >> "$last"
  s=$(((i + 1) * 10))
  echo "frame=  300 fps=60 q=28.0 size=    1024kB time=00:$(printf '%02d' $((s / 60))):$(printf '%02d' $((s % 60))).00 bitrate= 838.9kbits/s speed=2.00x" >&2
  i=$((i + 1))
done
echo "#EXT-X-ENDLIST" >> "$last"
exit 0
"##;

/// Write the fake tool into `dir` and return its path.
pub fn write_fake_tool(dir: &Path, options: &TestOptions) -> PathBuf {
    let script = FAKE_TOOL
        .replace("@REMUX@", options.remux.as_str())
        .replace("@TRANSCODE@", options.transcode.as_str())
        .replace("@SEGMENTS@", &options.segments.to_string());
    let path = dir.join("fake-ffmpeg.sh");
    std::fs::write(&path, script).expect("write fake tool");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("chmod fake tool");
    path
}

/// Object store that refuses uploads for some keys and counts attempts.
#[derive(Debug)]
pub struct FlakyObjectStore {
    inner: MemoryObjectStore,
    failing_suffix: String,
    pub attempts: DashMap<String, u32>,
}

impl FlakyObjectStore {
    pub fn new(failing_suffix: &str) -> Self {
        Self {
            inner: MemoryObjectStore::new("recordings"),
            failing_suffix: failing_suffix.to_string(),
            attempts: DashMap::new(),
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner.keys()
    }
}

#[async_trait]
impl ObjectStore for FlakyObjectStore {
    fn provider_type(&self) -> &str {
        "flaky"
    }

    fn bucket(&self) -> &str {
        self.inner.bucket()
    }

    async fn health_check(&self) -> AppResult<bool> {
        self.inner.health_check().await
    }

    async fn bucket_exists(&self) -> AppResult<bool> {
        self.inner.bucket_exists().await
    }

    async fn create_bucket(&self) -> AppResult<()> {
        self.inner.create_bucket().await
    }

    async fn put_object(&self, key: &str, data: Bytes, content_type: &str) -> AppResult<()> {
        *self.attempts.entry(key.to_string()).or_insert(0) += 1;
        if key.ends_with(&self.failing_suffix) {
            // Let sibling uploads get going before this one gives up.
            tokio::time::sleep(Duration::from_millis(20)).await;
            return Err(AppError::storage(format!("backend refused {key}")));
        }
        self.inner.put_object(key, data, content_type).await
    }

    async fn get_object(&self, key: &str) -> AppResult<ByteStream> {
        self.inner.get_object(key).await
    }

    async fn head_object(&self, key: &str) -> AppResult<Option<ObjectMeta>> {
        self.inner.head_object(key).await
    }

    async fn delete_object(&self, key: &str) -> AppResult<()> {
        self.inner.delete_object(key).await
    }

    async fn presigned_url(&self, key: &str, expires_in: Duration) -> AppResult<String> {
        self.inner.presigned_url(key, expires_in).await
    }
}

/// Record store whose commits take a while.
#[derive(Debug)]
pub struct SlowCommitStore {
    inner: Arc<MemoryRecordRepository>,
    delay: Duration,
}

#[async_trait]
impl RecordStore for SlowCommitStore {
    fn backend(&self) -> &str {
        "slow-memory"
    }

    async fn health_check(&self) -> AppResult<bool> {
        self.inner.health_check().await
    }

    async fn find_by_id(&self, id: i64) -> AppResult<Option<Recording>> {
        self.inner.find_by_id(id).await
    }

    async fn ensure(&self, id: i64, name: &str) -> AppResult<Recording> {
        self.inner.ensure(id, name).await
    }

    async fn mark_recorded(
        &self,
        id: i64,
        kind: MediaKind,
        path: &str,
        at: DateTime<Utc>,
        expected: &RecordedState,
    ) -> AppResult<Option<Recording>> {
        tokio::time::sleep(self.delay).await;
        self.inner.mark_recorded(id, kind, path, at, expected).await
    }

    async fn revert_recorded(
        &self,
        id: i64,
        kind: MediaKind,
        committed_path: &str,
        restore: &RecordedState,
    ) -> AppResult<Option<Recording>> {
        self.inner.revert_recorded(id, kind, committed_path, restore).await
    }
}

/// Test application context
pub struct TestApp {
    pub service: IngestService,
    pub records: Arc<MemoryRecordRepository>,
    pub objects: Arc<MemoryObjectStore>,
    pub flaky: Option<Arc<FlakyObjectStore>>,
    pub config: AppConfig,
    pub scratch_root: PathBuf,
    _dir: TempDir,
}

impl TestApp {
    /// App with the default fake tool and one record (id 42).
    pub async fn new() -> Self {
        Self::with_options(TestOptions::default()).await
    }

    pub async fn with_options(options: TestOptions) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let tool = write_fake_tool(dir.path(), &options);
        let scratch_root = dir.path().join("scratch");

        let mut config = AppConfig::default();
        config.media.ffmpeg_path = tool.display().to_string();
        config.media.remux_timeout_seconds = 1;
        config.media.transcode_stall_timeout_seconds = options.stall_timeout_seconds;
        config.ingest.max_chunk_bytes = 512 * 1024;
        config.ingest.finalize_timeout_seconds = options.finalize_timeout_seconds;
        config.publish.max_attempts = options.publish_attempts;
        config.publish.retry_delay_ms = 0;
        config.publish.concurrency = options.publish_concurrency;
        config.scratch.root = scratch_root.display().to_string();

        let records = Arc::new(MemoryRecordRepository::new());
        records.insert(Recording::new(42, "Ada Lovelace"));

        let objects = Arc::new(MemoryObjectStore::new("recordings"));
        let flaky = options
            .failing_suffix
            .as_deref()
            .map(|suffix| Arc::new(FlakyObjectStore::new(suffix)));
        let store: Arc<dyn ObjectStore> = match &flaky {
            Some(f) => f.clone(),
            None => objects.clone(),
        };

        let record_store: Arc<dyn RecordStore> = if options.commit_delay.is_zero() {
            records.clone()
        } else {
            Arc::new(SlowCommitStore {
                inner: records.clone(),
                delay: options.commit_delay,
            })
        };

        let service = IngestService::new(&config, store, record_store);
        service.bootstrap().await.expect("bootstrap");

        Self {
            service,
            records,
            objects,
            flaky,
            config,
            scratch_root,
            _dir: dir,
        }
    }

    /// Send `sizes.len()` chunks of the given sizes for `upload_id`.
    pub fn upload(&self, upload_id: &str, record_id: i64, sizes: &[usize]) {
        let total = sizes.len() as u32;
        for (index, size) in sizes.iter().enumerate() {
            self.service
                .receive_chunk(chunk(upload_id, index as u32, total, record_id, *size))
                .expect("chunk accepted");
        }
    }

    pub async fn record(&self, id: i64) -> Recording {
        self.records
            .find_by_id(id)
            .await
            .expect("find")
            .expect("record exists")
    }

    /// Directory names currently under the scratch root.
    pub fn scratch_entries(&self) -> Vec<String> {
        match std::fs::read_dir(&self.scratch_root) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Wait until no finalize job is in flight for `upload_id`.
    pub async fn wait_idle(&self, upload_id: &str) {
        for _ in 0..200 {
            if self.service.job_status(upload_id).is_none()
                && self.service.status().await.active_jobs.is_empty()
            {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("job for {upload_id} still running");
    }
}

pub fn chunk(upload_id: &str, index: u32, total: u32, record_id: i64, size: usize) -> IncomingChunk {
    IncomingChunk {
        upload_id: upload_id.to_string(),
        chunk_index: index,
        total_chunks: total,
        data: Bytes::from(vec![b'a' + (index % 26) as u8; size]),
        owner_record_id: record_id,
        file_name: "capture.webm".to_string(),
    }
}

pub fn video(upload_id: &str) -> FinalizeRequest {
    FinalizeRequest {
        upload_id: upload_id.to_string(),
        media_kind: MediaKind::Video,
    }
}
