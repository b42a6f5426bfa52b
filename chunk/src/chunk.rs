use crate::index_store::{IndexAppendError, IndexError, IndexSnapshot, IndexStore};
use clock::TimeProviderRef;
use data_types::{ChunkId, ChunkInfo, ChunkState, Query, Record, SearchResult};
use parking_lot::Mutex;
use std::sync::Arc;

/// A single append-only index shard: owns one [`IndexStore`] for its entire lifetime and tracks
/// the [`ChunkInfo`] metadata record alongside it.
#[derive(Debug)]
pub struct Chunk {
    index: Box<dyn IndexStore>,
    info: Mutex<ChunkInfo>,
    time_provider: TimeProviderRef,
}

impl Chunk {
    /// Create a fresh, `Live` chunk over a brand-new index store.
    pub fn new(prefix: impl Into<String>, index: Box<dyn IndexStore>, time_provider: TimeProviderRef) -> Self {
        let now = time_provider.now().timestamp_secs();
        Self {
            index,
            info: Mutex::new(ChunkInfo::new(prefix, now)),
            time_provider,
        }
    }

    /// This chunk's unique id.
    pub fn id(&self) -> ChunkId {
        self.info.lock().chunk_id
    }

    /// A snapshot of this chunk's current metadata record.
    pub fn info(&self) -> ChunkInfo {
        self.info.lock().clone()
    }

    /// Whether `[start_s, end_s]` intersects this chunk's time range.
    pub fn contains_time_range(&self, start_s: i64, end_s: i64) -> bool {
        self.info.lock().overlaps(start_s, end_s)
    }

    /// Append one record to the index store, widening this chunk's time bounds and counters.
    ///
    /// Callers (the chunk manager) are responsible for only calling this while the chunk is
    /// `Live`; the chunk itself does not re-check state on the append hot path.
    pub async fn append<R: Record + ?Sized>(
        &self,
        record: &R,
        size_bytes: u64,
    ) -> Result<(), IndexAppendError> {
        self.index.append(record.serialize().into()).await?;
        let now = self.time_provider.now().timestamp_secs();
        self.info
            .lock()
            .record_append(record.timestamp_epoch_ms() / 1000, size_bytes, now);
        Ok(())
    }

    /// Delegate a search to the index store.
    pub async fn query(&self, query: &Query) -> Result<SearchResult, IndexError> {
        let hits = self.index.query(query).await?;
        let mut hits = hits;
        hits.sort_by(|a, b| b.sort_key.cmp(&a.sort_key));
        hits.truncate(query.how_many);
        Ok(SearchResult {
            hits,
            buckets: Vec::new(),
            failed_chunks: 0,
        })
    }

    /// Flush the index store and take a point-in-time snapshot of its on-disk files.
    pub async fn take_snapshot(&self) -> Result<Box<dyn IndexSnapshot>, IndexError> {
        self.index.commit().await?;
        self.index.take_snapshot().await
    }

    /// Release a snapshot previously obtained from [`Chunk::take_snapshot`].
    pub async fn release_snapshot(snapshot: Box<dyn IndexSnapshot>) -> Result<(), IndexError> {
        snapshot.release().await
    }

    /// Close the underlying index store. Does not remove on-disk files.
    pub async fn close(&self) -> Result<(), IndexError> {
        self.index.close().await
    }

    /// Remove this chunk's on-disk directory. Only valid after [`Chunk::close`] and once no
    /// query holds a snapshot reference.
    pub async fn cleanup(&self) -> Result<(), IndexError> {
        self.index.cleanup().await
    }

    /// Transition `Live` → `ReadOnly`: no further appends are accepted. Called durably before
    /// the rollover task begins uploading.
    pub fn mark_read_only(&self) {
        let mut info = self.info.lock();
        info.state = ChunkState::ReadOnly;
        info.last_updated_epoch_s = self.time_provider.now().timestamp_secs();
    }

    /// Transition `ReadOnly` → `Uploaded`, recording the blob store path the snapshot landed at.
    pub fn mark_uploaded(&self, snapshot_path: impl Into<String>) {
        let mut info = self.info.lock();
        info.state = ChunkState::Uploaded;
        info.snapshot_path = Some(snapshot_path.into());
        info.last_updated_epoch_s = self.time_provider.now().timestamp_secs();
    }

    /// Transition `ReadOnly` → `Failed`. Terminal; the chunk manager is expected to arrest
    /// ingestion when this happens.
    pub fn mark_failed(&self) {
        let mut info = self.info.lock();
        info.state = ChunkState::Failed;
        info.last_updated_epoch_s = self.time_provider.now().timestamp_secs();
    }
}

/// Shared ownership handle used by the chunk manager, which keeps chunks alive in its map while
/// queries may be concurrently reading them.
pub type SharedChunk = Arc<Chunk>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index_store::IndexAppendError as AppendErr;
    use async_trait::async_trait;
    use bytes::Bytes;
    use clock::{MockProvider, Time};
    use data_types::Hit;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    #[derive(Debug)]
    struct FakeIndex {
        appended: Mutex<Vec<Bytes>>,
        commits: AtomicUsize,
        fail_append: bool,
    }

    impl FakeIndex {
        fn new() -> Self {
            Self {
                appended: Mutex::new(Vec::new()),
                commits: AtomicUsize::new(0),
                fail_append: false,
            }
        }
    }

    #[derive(Debug)]
    struct FakeSnapshot {
        files: Vec<(String, Bytes)>,
    }

    #[async_trait]
    impl IndexSnapshot for FakeSnapshot {
        async fn files(&self) -> Result<Vec<(String, Bytes)>, IndexError> {
            Ok(self.files.clone())
        }

        async fn release(self: Box<Self>) -> Result<(), IndexError> {
            Ok(())
        }
    }

    #[async_trait]
    impl IndexStore for FakeIndex {
        async fn append(&self, record: Bytes) -> Result<(), AppendErr> {
            if self.fail_append {
                return Err(AppendErr::Backend("forced failure".into()));
            }
            self.appended.lock().push(record);
            Ok(())
        }

        async fn query(&self, query: &Query) -> Result<Vec<Hit>, IndexError> {
            Ok(self
                .appended
                .lock()
                .iter()
                .enumerate()
                .map(|(i, payload)| Hit {
                    sort_key: i as i64,
                    payload: payload.to_vec(),
                })
                .take(query.how_many)
                .collect())
        }

        async fn commit(&self) -> Result<(), IndexError> {
            self.commits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn take_snapshot(&self) -> Result<Box<dyn IndexSnapshot>, IndexError> {
            Ok(Box::new(FakeSnapshot {
                files: vec![("segment.dat".to_string(), Bytes::from_static(b"data"))],
            }))
        }

        async fn close(&self) -> Result<(), IndexError> {
            Ok(())
        }

        async fn cleanup(&self) -> Result<(), IndexError> {
            Ok(())
        }
    }

    struct FakeRecord {
        payload: &'static str,
        timestamp_epoch_ms: i64,
    }

    impl Record for FakeRecord {
        fn serialize(&self) -> Vec<u8> {
            self.payload.as_bytes().to_vec()
        }

        fn timestamp_epoch_ms(&self) -> i64 {
            self.timestamp_epoch_ms
        }
    }

    fn chunk() -> Chunk {
        let clock = Arc::new(MockProvider::new(Time::from_timestamp_secs(1_000)));
        Chunk::new("test", Box::new(FakeIndex::new()), clock)
    }

    #[tokio::test]
    async fn append_widens_time_bounds_and_counters() {
        let chunk = chunk();
        chunk
            .append(
                &FakeRecord {
                    payload: "a",
                    timestamp_epoch_ms: 10_000,
                },
                5,
            )
            .await
            .unwrap();
        chunk
            .append(
                &FakeRecord {
                    payload: "b",
                    timestamp_epoch_ms: 20_000,
                },
                5,
            )
            .await
            .unwrap();

        let info = chunk.info();
        assert_eq!(info.message_count, 2);
        assert_eq!(info.bytes_indexed, 10);
        assert_eq!(info.data_start_epoch_s, 10);
        assert_eq!(info.data_end_epoch_s, 20);
        assert!(chunk.contains_time_range(15, 25));
        assert!(!chunk.contains_time_range(21, 100));
    }

    #[tokio::test]
    async fn state_transitions_follow_rollover_lifecycle() {
        let chunk = chunk();
        assert_eq!(chunk.info().state, ChunkState::Live);
        chunk.mark_read_only();
        assert_eq!(chunk.info().state, ChunkState::ReadOnly);
        chunk.mark_uploaded("bucket/chunk-1/segment.dat");
        assert_eq!(chunk.info().state, ChunkState::Uploaded);
        assert_eq!(
            chunk.info().snapshot_path.as_deref(),
            Some("bucket/chunk-1/segment.dat")
        );
    }

    #[tokio::test]
    async fn query_bounds_hits_to_how_many() {
        let chunk = chunk();
        for i in 0..5 {
            chunk
                .append(
                    &FakeRecord {
                        payload: "x",
                        timestamp_epoch_ms: i * 1000,
                    },
                    1,
                )
                .await
                .unwrap();
        }
        let result = chunk
            .query(&Query {
                start_epoch_s: 0,
                end_epoch_s: 100,
                query_string: "*".to_string(),
                how_many: 2,
                buckets: Vec::new(),
            })
            .await
            .unwrap();
        assert_eq!(result.hits.len(), 2);
    }

    #[tokio::test]
    async fn take_snapshot_commits_before_snapshotting() {
        let chunk = chunk();
        let snapshot = chunk.take_snapshot().await.unwrap();
        let files = snapshot.files().await.unwrap();
        assert_eq!(files.len(), 1);
        Chunk::release_snapshot(snapshot).await.unwrap();
    }
}
