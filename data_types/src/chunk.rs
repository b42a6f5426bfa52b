use std::fmt::{self, Display, Formatter};
use uuid::Uuid;

/// Opaque, unique identifier for a chunk. Unique for the lifetime of the process; never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChunkId(Uuid);

impl ChunkId {
    /// Mint a fresh, random chunk id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ChunkId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ChunkId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Where a [`ChunkInfo`] is in its append → seal → upload lifecycle.
///
/// `Live` is the only state that accepts appends. `Uploaded` and `Failed` are terminal: a chunk
/// never transitions back to a writable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkState {
    /// Accepting appends. At most one chunk per chunk manager is `Live`.
    Live,
    /// Sealed by rollover; no further appends. Snapshot/upload in flight or pending.
    ReadOnly,
    /// Snapshot uploaded to the blob store. Eligible for stale-chunk eviction.
    Uploaded,
    /// Rollover failed at some step. Eligible for stale-chunk eviction; ingestion has been
    /// arrested for the whole chunk manager.
    Failed,
}

/// The metadata record tracked for a single chunk: everything about it except the index data
/// itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkInfo {
    /// Unique id of this chunk.
    pub chunk_id: ChunkId,
    /// Logical namespace this chunk belongs to.
    pub prefix: String,
    /// Minimum record timestamp contained in this chunk, in epoch seconds.
    pub data_start_epoch_s: i64,
    /// Maximum record timestamp contained in this chunk, in epoch seconds.
    pub data_end_epoch_s: i64,
    /// Wall-clock time this chunk was created.
    pub created_epoch_s: i64,
    /// Wall-clock time this chunk's metadata was last updated.
    pub last_updated_epoch_s: i64,
    /// Total records appended.
    pub message_count: u64,
    /// Total bytes appended, as reported by the writer (estimate, not an on-disk size).
    pub bytes_indexed: u64,
    /// Current lifecycle state.
    pub state: ChunkState,
    /// Path under the blob store's bucket the snapshot was uploaded to, once uploaded.
    pub snapshot_path: Option<String>,
}

impl ChunkInfo {
    /// A brand new, empty, `Live` chunk record.
    pub fn new(prefix: impl Into<String>, now_epoch_s: i64) -> Self {
        Self {
            chunk_id: ChunkId::new(),
            prefix: prefix.into(),
            data_start_epoch_s: now_epoch_s,
            data_end_epoch_s: now_epoch_s,
            created_epoch_s: now_epoch_s,
            last_updated_epoch_s: now_epoch_s,
            message_count: 0,
            bytes_indexed: 0,
            state: ChunkState::Live,
            snapshot_path: None,
        }
    }

    /// Whether `[start_s, end_s]` intersects this chunk's `[data_start_epoch_s,
    /// data_end_epoch_s]`. An empty chunk (no messages appended) never overlaps anything.
    pub fn overlaps(&self, start_s: i64, end_s: i64) -> bool {
        self.message_count > 0 && start_s <= self.data_end_epoch_s && end_s >= self.data_start_epoch_s
    }

    /// Fold a newly appended record's timestamp and size into this chunk's bounds and counters.
    pub fn record_append(&mut self, timestamp_epoch_s: i64, size_bytes: u64, now_epoch_s: i64) {
        if self.message_count == 0 {
            self.data_start_epoch_s = timestamp_epoch_s;
            self.data_end_epoch_s = timestamp_epoch_s;
        } else {
            self.data_start_epoch_s = self.data_start_epoch_s.min(timestamp_epoch_s);
            self.data_end_epoch_s = self.data_end_epoch_s.max(timestamp_epoch_s);
        }
        self.message_count += 1;
        self.bytes_indexed += size_bytes;
        self.last_updated_epoch_s = now_epoch_s;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_chunk_never_overlaps() {
        let info = ChunkInfo::new("p", 0);
        assert!(!info.overlaps(i64::MIN, i64::MAX));
    }

    #[test]
    fn overlap_is_inclusive_intersection() {
        let mut info = ChunkInfo::new("p", 0);
        info.record_append(10, 1, 10);
        info.record_append(20, 1, 20);
        assert!(info.overlaps(15, 28));
        assert!(info.overlaps(20, 20));
        assert!(!info.overlaps(21, 100));
        assert!(!info.overlaps(-100, 9));
    }

    #[test]
    fn record_append_widens_bounds_and_counters() {
        let mut info = ChunkInfo::new("p", 0);
        info.record_append(5, 15, 5);
        info.record_append(2, 15, 6);
        assert_eq!(info.data_start_epoch_s, 2);
        assert_eq!(info.data_end_epoch_s, 5);
        assert_eq!(info.message_count, 2);
        assert_eq!(info.bytes_indexed, 30);
        assert_eq!(info.last_updated_epoch_s, 6);
    }
}
