//! One in-flight chunked transfer.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// An upload session: a fixed number of slots, each empty or holding the
/// bytes of one chunk.
///
/// The slot vector is sized once at creation and never resized.
#[derive(Debug, Clone)]
pub struct UploadSession {
    upload_id: String,
    owner_record_id: i64,
    file_name: String,
    slots: Vec<Option<Bytes>>,
    received: usize,
    created_at: DateTime<Utc>,
    last_activity: Instant,
}

impl UploadSession {
    /// Create an empty session with `total_chunks` slots.
    pub fn new(
        upload_id: impl Into<String>,
        total_chunks: u32,
        owner_record_id: i64,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            upload_id: upload_id.into(),
            owner_record_id,
            file_name: file_name.into(),
            slots: vec![None; total_chunks as usize],
            received: 0,
            created_at: Utc::now(),
            last_activity: Instant::now(),
        }
    }

    /// Store the bytes for `index`, replacing anything already there.
    ///
    /// Returns `false` when the index is out of range.
    pub fn fill(&mut self, index: u32, data: Bytes) -> bool {
        let Some(slot) = self.slots.get_mut(index as usize) else {
            return false;
        };
        if slot.is_none() {
            self.received += 1;
        }
        *slot = Some(data);
        self.last_activity = Instant::now();
        true
    }

    /// Upload identifier.
    pub fn upload_id(&self) -> &str {
        &self.upload_id
    }

    /// Record the upload belongs to.
    pub fn owner_record_id(&self) -> i64 {
        self.owner_record_id
    }

    /// File name supplied by the client.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Number of slots.
    pub fn total_chunks(&self) -> u32 {
        self.slots.len() as u32
    }

    /// Number of filled slots.
    pub fn received_count(&self) -> u32 {
        self.received as u32
    }

    /// Whether every slot holds bytes.
    pub fn is_complete(&self) -> bool {
        self.received == self.slots.len()
    }

    /// Indices of the slots still empty.
    pub fn missing_indices(&self) -> Vec<u32> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_none())
            .map(|(i, _)| i as u32)
            .collect()
    }

    /// Slots in index order.
    pub fn slots(&self) -> &[Option<Bytes>] {
        &self.slots
    }

    /// Sum of the bytes held.
    pub fn byte_len(&self) -> u64 {
        self.slots.iter().flatten().map(|b| b.len() as u64).sum()
    }

    /// Wall-clock creation time.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Monotonic time of the last chunk receipt.
    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    /// Whether the session agrees with the attributes of a new chunk.
    pub fn matches(&self, total_chunks: u32, owner_record_id: i64, file_name: &str) -> bool {
        self.total_chunks() == total_chunks
            && self.owner_record_id == owner_record_id
            && self.file_name == file_name
    }
}
