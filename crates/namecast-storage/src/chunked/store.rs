//! Concurrent registry of upload sessions.

use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use tracing::{debug, info, warn};

use namecast_core::error::{AppError, ErrorKind};
use namecast_core::result::AppResult;

use super::session::UploadSession;

/// One chunk as handed over by the transport layer.
#[derive(Debug, Clone)]
pub struct IncomingChunk {
    /// Caller-supplied upload token.
    pub upload_id: String,
    /// Zero-based position of the chunk.
    pub chunk_index: u32,
    /// Number of chunks the upload consists of.
    pub total_chunks: u32,
    /// Raw chunk bytes.
    pub data: Bytes,
    /// Record the upload belongs to.
    pub owner_record_id: i64,
    /// Client file name.
    pub file_name: String,
}

/// Outcome of receiving one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChunkReceipt {
    /// Distinct chunk indices held so far.
    pub received_count: u32,
    /// Chunks in the upload.
    pub total_chunks: u32,
    /// Whether every chunk has arrived.
    pub is_complete: bool,
}

/// In-memory map from upload id to its [`UploadSession`].
///
/// Entries are sharded, so receipts for different uploads do not contend
/// on one lock. All mutation of a session happens through its entry.
#[derive(Debug)]
pub struct ChunkStore {
    sessions: DashMap<String, UploadSession>,
    max_chunk_bytes: usize,
    max_total_chunks: u32,
}

/// Default ceiling on `total_chunks`.
pub const DEFAULT_MAX_TOTAL_CHUNKS: u32 = 10_000;

impl ChunkStore {
    /// Create an empty store enforcing `max_chunk_bytes` per chunk.
    pub fn new(max_chunk_bytes: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            max_chunk_bytes,
            max_total_chunks: DEFAULT_MAX_TOTAL_CHUNKS,
        }
    }

    /// Limit how many chunks one upload may declare.
    pub fn with_max_total_chunks(mut self, max_total_chunks: u32) -> Self {
        self.max_total_chunks = max_total_chunks.max(1);
        self
    }

    /// Record a chunk, creating the session on the first chunk of an upload.
    ///
    /// Every rejection happens before any state is touched. Re-sending an
    /// index replaces the earlier bytes.
    pub fn receive(&self, chunk: IncomingChunk) -> AppResult<ChunkReceipt> {
        if chunk.upload_id.trim().is_empty() {
            return Err(AppError::missing_field("upload_id"));
        }
        if chunk.file_name.trim().is_empty() {
            return Err(AppError::missing_field("file_name"));
        }
        if chunk.total_chunks == 0 {
            return Err(AppError::missing_field("total_chunks"));
        }
        if chunk.owner_record_id <= 0 {
            return Err(AppError::missing_field("owner_record_id"));
        }
        if chunk.total_chunks > self.max_total_chunks {
            return Err(AppError::new(
                ErrorKind::TooManyChunks,
                format!(
                    "Upload '{}' declares {} chunks, limit is {}",
                    chunk.upload_id, chunk.total_chunks, self.max_total_chunks
                ),
            ));
        }
        if chunk.data.len() > self.max_chunk_bytes {
            return Err(AppError::new(
                ErrorKind::ChunkTooLarge,
                format!(
                    "Chunk {} of upload '{}' is {} bytes, limit is {}",
                    chunk.chunk_index,
                    chunk.upload_id,
                    chunk.data.len(),
                    self.max_chunk_bytes
                ),
            ));
        }
        if chunk.chunk_index >= chunk.total_chunks {
            return Err(AppError::new(
                ErrorKind::ChunkIndexOutOfRange,
                format!(
                    "Chunk index {} is outside 0..{}",
                    chunk.chunk_index, chunk.total_chunks
                ),
            ));
        }

        let IncomingChunk {
            upload_id,
            chunk_index,
            total_chunks,
            data,
            owner_record_id,
            file_name,
        } = chunk;

        let receipt = match self.sessions.entry(upload_id) {
            Entry::Occupied(mut entry) => {
                let session = entry.get_mut();
                if !session.matches(total_chunks, owner_record_id, &file_name) {
                    return Err(AppError::new(
                        ErrorKind::SessionMismatch,
                        format!(
                            "Chunk for upload '{}' disagrees with the open session \
                             (total_chunks {} vs {}, record {} vs {})",
                            session.upload_id(),
                            total_chunks,
                            session.total_chunks(),
                            owner_record_id,
                            session.owner_record_id()
                        ),
                    ));
                }
                session.fill(chunk_index, data);
                receipt_for(session)
            }
            Entry::Vacant(entry) => {
                debug!(
                    upload_id = %entry.key(),
                    total_chunks,
                    record_id = owner_record_id,
                    "Opening upload session"
                );
                let mut session =
                    UploadSession::new(entry.key().clone(), total_chunks, owner_record_id, file_name);
                session.fill(chunk_index, data);
                let receipt = receipt_for(&session);
                entry.insert(session);
                receipt
            }
        };

        Ok(receipt)
    }

    /// Remove and return a session whose slots are all filled.
    ///
    /// An incomplete session stays in the store untouched.
    pub fn take_completed(&self, upload_id: &str) -> AppResult<UploadSession> {
        if let Some((_, session)) = self.sessions.remove_if(upload_id, |_, s| s.is_complete()) {
            return Ok(session);
        }

        match self.sessions.get(upload_id) {
            Some(session) => Err(AppError::new(
                ErrorKind::IncompleteSession,
                format!(
                    "Upload '{upload_id}' has {} of {} chunks (missing {:?})",
                    session.received_count(),
                    session.total_chunks(),
                    session.missing_indices()
                ),
            )),
            None => Err(unknown_session(upload_id)),
        }
    }

    /// Put back a session taken with [`take_completed`](Self::take_completed)
    /// whose finalize was rejected before any work started. A session that
    /// was re-opened in the meantime wins.
    pub fn restore(&self, session: UploadSession) {
        let upload_id = session.upload_id().to_string();
        if let Entry::Vacant(entry) = self.sessions.entry(upload_id) {
            debug!(upload_id = %entry.key(), "Restoring upload session");
            entry.insert(session);
        }
    }

    /// Receipt for an open session without changing it.
    pub fn progress(&self, upload_id: &str) -> AppResult<ChunkReceipt> {
        self.sessions
            .get(upload_id)
            .map(|s| receipt_for(&s))
            .ok_or_else(|| unknown_session(upload_id))
    }

    /// Drop a session and its bytes. Returns whether one existed.
    pub fn discard(&self, upload_id: &str) -> bool {
        let removed = self.sessions.remove(upload_id).is_some();
        if removed {
            info!(upload_id, "Discarded upload session");
        }
        removed
    }

    /// Delete every session untouched for longer than `stale_after`.
    ///
    /// Incomplete uploads removed here are lost; the client has to start over.
    pub fn sweep_stale(&self, stale_after: Duration) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|upload_id, session| {
            let keep = session.last_activity().elapsed() <= stale_after;
            if !keep {
                warn!(
                    upload_id = %upload_id,
                    received = session.received_count(),
                    total = session.total_chunks(),
                    "Dropping stale upload session"
                );
            }
            keep
        });
        before.saturating_sub(self.sessions.len())
    }

    /// Number of open sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

fn receipt_for(session: &UploadSession) -> ChunkReceipt {
    ChunkReceipt {
        received_count: session.received_count(),
        total_chunks: session.total_chunks(),
        is_complete: session.is_complete(),
    }
}

fn unknown_session(upload_id: &str) -> AppError {
    AppError::new(
        ErrorKind::UnknownUploadSession,
        format!("No upload session '{upload_id}'"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(upload_id: &str, index: u32, total: u32, data: &'static [u8]) -> IncomingChunk {
        IncomingChunk {
            upload_id: upload_id.to_string(),
            chunk_index: index,
            total_chunks: total,
            data: Bytes::from_static(data),
            owner_record_id: 42,
            file_name: "take.webm".to_string(),
        }
    }

    #[test]
    fn test_second_write_wins_and_count_is_bounded() {
        let store = ChunkStore::new(1024);
        store.receive(chunk("abc", 0, 2, b"first")).expect("receive");
        let receipt = store.receive(chunk("abc", 0, 2, b"second")).expect("receive");
        assert_eq!(receipt.received_count, 1);
        assert!(!receipt.is_complete);

        let receipt = store.receive(chunk("abc", 1, 2, b"tail")).expect("receive");
        assert_eq!(receipt.received_count, 2);
        assert!(receipt.is_complete);
        let receipt = store.receive(chunk("abc", 1, 2, b"tail2")).expect("receive");
        assert_eq!(receipt.received_count, 2);

        let session = store.take_completed("abc").expect("complete");
        assert_eq!(session.slots()[0].as_deref(), Some(&b"second"[..]));
        assert_eq!(store.session_count(), 0);
    }

    #[test]
    fn test_oversize_chunk_leaves_no_session() {
        let store = ChunkStore::new(4);
        let err = store.receive(chunk("big", 0, 1, b"too long")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ChunkTooLarge);
        assert_eq!(store.session_count(), 0);
    }

    #[test]
    fn test_missing_fields_rejected() {
        let store = ChunkStore::new(64);
        let err = store.receive(chunk("", 0, 1, b"x")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MissingField);
        let err = store.receive(chunk("abc", 0, 0, b"x")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MissingField);
        let mut nameless = chunk("abc", 0, 1, b"x");
        nameless.file_name.clear();
        assert_eq!(store.receive(nameless).unwrap_err().kind, ErrorKind::MissingField);
    }

    #[test]
    fn test_index_out_of_range() {
        let store = ChunkStore::new(64);
        let err = store.receive(chunk("abc", 3, 3, b"x")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ChunkIndexOutOfRange);
    }

    #[test]
    fn test_mismatched_chunk_rejected_without_mutation() {
        let store = ChunkStore::new(64);
        store.receive(chunk("abc", 0, 3, b"x")).expect("receive");
        let err = store.receive(chunk("abc", 1, 4, b"y")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::SessionMismatch);
        assert_eq!(store.progress("abc").expect("progress").received_count, 1);
    }

    #[test]
    fn test_huge_total_chunks_rejected_before_allocation() {
        let store = ChunkStore::new(64).with_max_total_chunks(100);
        let err = store.receive(chunk("huge", 0, u32::MAX, b"x")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TooManyChunks);
        assert_eq!(store.session_count(), 0);

        let receipt = store.receive(chunk("fits", 99, 100, b"x")).expect("receive");
        assert_eq!(receipt.total_chunks, 100);
    }

    #[test]
    fn test_single_chunk_gate() {
        let store = ChunkStore::new(64);
        let err = store.take_completed("solo").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownUploadSession);

        let receipt = store.receive(chunk("solo", 0, 1, b"x")).expect("receive");
        assert!(receipt.is_complete);
        let session = store.take_completed("solo").expect("complete");
        assert_eq!(session.total_chunks(), 1);
        assert!(store.take_completed("solo").is_err());
    }

    #[test]
    fn test_take_completed_gate() {
        for total in [2u32, 100] {
            let store = ChunkStore::new(64);
            for index in 0..total - 1 {
                store.receive(chunk("gate", index, total, b"x")).expect("receive");
            }
            let err = store.take_completed("gate").unwrap_err();
            assert_eq!(err.kind, ErrorKind::IncompleteSession);
            // Still there for a later retry.
            assert_eq!(store.session_count(), 1);
        }
    }

    #[test]
    fn test_restore_after_take() {
        let store = ChunkStore::new(64);
        store.receive(chunk("abc", 0, 1, b"x")).expect("receive");
        let session = store.take_completed("abc").expect("complete");
        assert_eq!(store.session_count(), 0);
        store.restore(session);
        assert!(store.progress("abc").expect("progress").is_complete);
    }

    #[test]
    fn test_take_unknown_session() {
        let store = ChunkStore::new(64);
        let err = store.take_completed("nope").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownUploadSession);
    }

    #[test]
    fn test_discard() {
        let store = ChunkStore::new(64);
        store.receive(chunk("abc", 0, 2, b"x")).expect("receive");
        assert!(store.discard("abc"));
        assert!(!store.discard("abc"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_removes_only_stale_sessions() {
        let store = ChunkStore::new(64);
        store.receive(chunk("old", 0, 2, b"x")).expect("receive");
        tokio::time::advance(Duration::from_secs(3000)).await;
        store.receive(chunk("fresh", 0, 2, b"x")).expect("receive");
        tokio::time::advance(Duration::from_secs(700)).await;

        assert_eq!(store.sweep_stale(Duration::from_secs(3600)), 1);
        assert!(store.progress("old").is_err());
        assert!(store.progress("fresh").is_ok());
    }
}
