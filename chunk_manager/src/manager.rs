use crate::{
    error::{ChunkManagerError, ChunkQueryError},
    metrics::ChunkManagerMetrics,
};
use blob_store::BlobStoreGateway;
use chunk::{Chunk, IndexStore, RolloverStrategy, RolloverTask};
use clock::TimeProviderRef;
use data_types::{ChunkId, ChunkInfo, Offset, Query, Record, SearchResult};
use metadata_store::MetadataStore;
use metric::Registry;
use observability_deps::tracing::{info, warn};
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{
    sync::Semaphore,
    task::JoinHandle,
    time::timeout,
};

/// Constructs a fresh, empty index store for a newly created chunk. The concrete index engine
/// is out of scope for the core; this is the seam it plugs in through.
pub type IndexStoreFactory = Box<dyn Fn() -> Box<dyn IndexStore> + Send + Sync>;

/// The top-level ingestor: funnels a single writer's records into one of N chunks, enforces
/// rollover admission control through a strictly-serial executor, and exposes read fan-out
/// across every chunk whose time range overlaps a query.
///
/// `add_message` must only ever be called from one thread/task at a time; `query` may be called
/// from any number of threads concurrently with the writer and with each other.
pub struct ChunkManager {
    chunk_map: Mutex<HashMap<ChunkId, Arc<Chunk>>>,
    active: Mutex<Option<Arc<Chunk>>>,
    ingestion_stopped: Arc<AtomicBool>,
    rollover_permit: Arc<Semaphore>,
    rollover_inflight: Mutex<Option<JoinHandle<()>>>,
    strategy: Arc<dyn RolloverStrategy>,
    blob_store: BlobStoreGateway,
    metadata_store: Option<MetadataStore>,
    time_provider: TimeProviderRef,
    chunk_data_prefix: String,
    metadata_path_prefix: String,
    index_store_factory: IndexStoreFactory,
    rollover_timeout: Duration,
    highest_offset: Mutex<Option<Offset>>,
    metrics: ChunkManagerMetrics,
}

impl std::fmt::Debug for ChunkManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkManager")
            .field("chunk_data_prefix", &self.chunk_data_prefix)
            .field("ingestion_stopped", &self.ingestion_stopped.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl ChunkManager {
    /// Construct a chunk manager with no chunks and no active chunk.
    ///
    /// `ingestion_stopped` is shared rather than owned outright so that a metadata store's
    /// session-expiry fatal handler — constructed before the chunk manager exists, since the
    /// metadata store is one of its constructor arguments — can arrest ingestion through the
    /// same flag this manager checks on every `add_message`. Pass a fresh `Arc::new(false.into())`
    /// when no such external handler needs to share it.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        chunk_data_prefix: impl Into<String>,
        metadata_path_prefix: impl Into<String>,
        index_store_factory: IndexStoreFactory,
        strategy: Arc<dyn RolloverStrategy>,
        blob_store: BlobStoreGateway,
        metadata_store: Option<MetadataStore>,
        time_provider: TimeProviderRef,
        rollover_timeout: Duration,
        registry: &Registry,
        ingestion_stopped: Arc<AtomicBool>,
    ) -> Self {
        Self {
            chunk_map: Mutex::new(HashMap::new()),
            active: Mutex::new(None),
            ingestion_stopped,
            rollover_permit: Arc::new(Semaphore::new(1)),
            rollover_inflight: Mutex::new(None),
            strategy,
            blob_store,
            metadata_store,
            time_provider,
            chunk_data_prefix: chunk_data_prefix.into(),
            metadata_path_prefix: metadata_path_prefix.into(),
            index_store_factory,
            rollover_timeout,
            highest_offset: Mutex::new(None),
            metrics: ChunkManagerMetrics::new(registry),
        }
    }

    /// Whether ingestion has been arrested by a prior rollover failure or session expiry.
    pub fn ingestion_stopped(&self) -> bool {
        self.ingestion_stopped.load(Ordering::Acquire)
    }

    /// Arrest ingestion. Monotonic: once set, stays set. Called by the metadata store's fatal
    /// handler on session expiry, as well as internally on rollover failure.
    pub fn stop_ingestion(&self) {
        self.ingestion_stopped.store(true, Ordering::Release);
    }

    /// The highest upstream offset observed across every `add_message` call so far, regardless
    /// of whether that call succeeded, so a restart can resume the message source correctly.
    pub fn highest_offset(&self) -> Option<Offset> {
        *self.highest_offset.lock()
    }

    /// A snapshot of every chunk's current metadata record.
    pub fn chunk_infos(&self) -> Vec<ChunkInfo> {
        self.chunk_map.lock().values().map(|c| c.info()).collect()
    }

    /// Append one record to the active chunk, creating it if none exists, and submit a rollover
    /// if the post-append counters trip the rollover predicate.
    pub async fn add_message<R: Record + ?Sized>(
        &self,
        record: &R,
        size_bytes: u64,
        offset: Offset,
    ) -> Result<(), ChunkManagerError> {
        {
            let mut highest = self.highest_offset.lock();
            *highest = Some(highest.map_or(offset, |h| h.max(offset)));
        }

        if self.ingestion_stopped() {
            return Err(ChunkManagerError::IngestionStopped);
        }

        let chunk = self.active_or_create_chunk();
        chunk.append(record, size_bytes).await?;

        self.metrics.live_messages_indexed.inc(1);
        self.metrics.live_bytes_indexed.inc(size_bytes);

        let info = chunk.info();
        if self.strategy.should_roll_over(info.bytes_indexed, info.message_count) {
            self.do_rollover(chunk)?;
        }

        Ok(())
    }

    fn active_or_create_chunk(&self) -> Arc<Chunk> {
        let mut active = self.active.lock();
        if let Some(chunk) = active.as_ref() {
            return Arc::clone(chunk);
        }

        let index = (self.index_store_factory)();
        let chunk = Arc::new(Chunk::new(
            self.chunk_data_prefix.clone(),
            index,
            Arc::clone(&self.time_provider),
        ));
        info!(chunk_id = %chunk.id(), "created new active chunk");
        self.chunk_map.lock().insert(chunk.id(), Arc::clone(&chunk));
        *active = Some(Arc::clone(&chunk));
        chunk
    }

    /// Detach the active chunk and submit it for rollover. Internal; called from
    /// `add_message` when the rollover predicate fires.
    fn do_rollover(&self, chunk: Arc<Chunk>) -> Result<(), ChunkManagerError> {
        let permit = match Arc::clone(&self.rollover_permit).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                warn!(chunk_id = %chunk.id(), "rollover already in progress, arresting ingestion");
                self.stop_ingestion();
                return Err(ChunkManagerError::RolloverInProgress);
            }
        };

        *self.active.lock() = None;
        self.metrics.live_messages_indexed.set(0);
        self.metrics.live_bytes_indexed.set(0);
        chunk.mark_read_only();

        let task = RolloverTask::new(
            Arc::clone(&chunk),
            self.blob_store.clone(),
            self.metadata_store.clone(),
            self.chunk_data_prefix.clone(),
            self.metadata_path_prefix.clone(),
        );
        let ingestion_stopped = Arc::clone(&self.ingestion_stopped);
        let rollover_success = self.metrics.rollover_success.clone();
        let rollover_failure = self.metrics.rollover_failure.clone();

        let handle = tokio::spawn(async move {
            let succeeded = task.run().await;
            if succeeded {
                rollover_success.inc(1);
            } else {
                rollover_failure.inc(1);
                ingestion_stopped.store(true, Ordering::Release);
            }
            drop(permit);
        });

        *self.rollover_inflight.lock() = Some(handle);
        Ok(())
    }

    /// Roll over the active chunk, if one exists. Used on shutdown.
    pub fn roll_over_active(&self) -> Result<(), ChunkManagerError> {
        let chunk = self.active.lock().clone();
        match chunk {
            Some(chunk) => self.do_rollover(chunk),
            None => Ok(()),
        }
    }

    /// Fan out `query` to every chunk whose time range overlaps it, merging the results.
    /// Per-chunk failures are counted in the returned result's `failed_chunks`, not propagated.
    pub async fn query(&self, query: Query) -> SearchResult {
        let overlapping: Vec<Arc<Chunk>> = self
            .chunk_map
            .lock()
            .values()
            .filter(|c| c.contains_time_range(query.start_epoch_s, query.end_epoch_s))
            .cloned()
            .collect();

        let futures = overlapping.into_iter().map(|chunk| {
            let query = query.clone();
            async move { chunk.query(&query).await.map_err(ChunkQueryError::from) }
        });
        let outcomes = futures::future::join_all(futures).await;

        let mut results = Vec::new();
        let mut failed_chunks = 0;
        for outcome in outcomes {
            match outcome {
                Ok(result) => results.push(result),
                Err(e) => {
                    warn!(error = %e, "per-chunk query failed");
                    failed_chunks += 1;
                }
            }
        }

        let mut merged = search::merge(&query, results);
        merged.failed_chunks += failed_chunks;
        merged
    }

    /// Remove chunks in `ids` from the map and tear them down. Per-entry failures are logged,
    /// not propagated; the batch always runs to completion.
    pub async fn remove_stale(&self, ids: &[ChunkId]) {
        for id in ids {
            let chunk = self.chunk_map.lock().remove(id);
            let Some(chunk) = chunk else {
                warn!(chunk_id = %id, "remove_stale: chunk not present, skipping");
                continue;
            };
            if let Err(e) = chunk.close().await {
                warn!(chunk_id = %id, error = %e, "error closing stale chunk");
            }
            if let Err(e) = chunk.cleanup().await {
                warn!(chunk_id = %id, error = %e, "error cleaning up stale chunk");
            }
        }
    }

    /// Shut the rollover executor to new tasks, await the in-flight rollover up to the
    /// configured timeout, then close every chunk. Never fails: data integrity requires the
    /// close pass to run to completion regardless of what it finds.
    pub async fn close(&self) {
        let _ = self.roll_over_active();

        let handle = self.rollover_inflight.lock().take();
        if let Some(handle) = handle {
            if timeout(self.rollover_timeout, handle).await.is_err() {
                warn!("rollover did not finish within the shutdown timeout, forcing shutdown");
            }
        }

        let chunks: Vec<Arc<Chunk>> = self.chunk_map.lock().values().cloned().collect();
        for chunk in chunks {
            if let Err(e) = chunk.close().await {
                warn!(chunk_id = %chunk.id(), error = %e, "error closing chunk during shutdown");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backoff::BackoffConfig;
    use bytes::Bytes;
    use chunk::{IndexAppendError, IndexError, IndexSnapshot, ThresholdRolloverStrategy};
    use clock::{MockProvider, Time};
    use data_types::{ChunkState, Hit};
    use object_store::{memory::InMemory, DynObjectStore};
    use parking_lot::Mutex as PLMutex;

    #[derive(Debug)]
    struct FakeIndex {
        appended: PLMutex<Vec<Bytes>>,
    }

    #[derive(Debug)]
    struct FakeSnapshot;

    #[async_trait::async_trait]
    impl IndexSnapshot for FakeSnapshot {
        async fn files(&self) -> Result<Vec<(String, Bytes)>, IndexError> {
            Ok(vec![("segment.dat".to_string(), Bytes::from_static(b"x"))])
        }

        async fn release(self: Box<Self>) -> Result<(), IndexError> {
            Ok(())
        }
    }

    #[async_trait::async_trait]
    impl IndexStore for FakeIndex {
        async fn append(&self, record: Bytes) -> Result<(), IndexAppendError> {
            self.appended.lock().push(record);
            Ok(())
        }

        async fn query(&self, query: &Query) -> Result<Vec<Hit>, IndexError> {
            Ok(self
                .appended
                .lock()
                .iter()
                .enumerate()
                .map(|(i, p)| Hit {
                    sort_key: i as i64,
                    payload: p.to_vec(),
                })
                .take(query.how_many)
                .collect())
        }

        async fn commit(&self) -> Result<(), IndexError> {
            Ok(())
        }

        async fn take_snapshot(&self) -> Result<Box<dyn IndexSnapshot>, IndexError> {
            Ok(Box::new(FakeSnapshot))
        }

        async fn close(&self) -> Result<(), IndexError> {
            Ok(())
        }

        async fn cleanup(&self) -> Result<(), IndexError> {
            Ok(())
        }
    }

    struct FakeRecord {
        timestamp_epoch_ms: i64,
    }

    impl Record for FakeRecord {
        fn serialize(&self) -> Vec<u8> {
            b"record".to_vec()
        }

        fn timestamp_epoch_ms(&self) -> i64 {
            self.timestamp_epoch_ms
        }
    }

    fn test_manager(bytes_threshold: u64, messages_threshold: u64) -> ChunkManager {
        let store: Arc<DynObjectStore> = Arc::new(InMemory::new());
        let blob_store = BlobStoreGateway::new(store, BackoffConfig::default());
        let time_provider: TimeProviderRef =
            Arc::new(MockProvider::new(Time::from_timestamp_secs(1_000)));
        let registry = Registry::new();

        ChunkManager::new(
            "test",
            "/logdex",
            Box::new(|| Box::new(FakeIndex { appended: PLMutex::new(Vec::new()) })),
            Arc::new(ThresholdRolloverStrategy::new(bytes_threshold, messages_threshold)),
            blob_store,
            None,
            time_provider,
            Duration::from_secs(5),
            &registry,
            Arc::new(AtomicBool::new(false)),
        )
    }

    #[tokio::test]
    async fn appends_accumulate_on_a_single_active_chunk() {
        let manager = test_manager(1_000_000, 1_000_000);
        for i in 0..5u64 {
            manager
                .add_message(&FakeRecord { timestamp_epoch_ms: 1_000_000 + i as i64 }, 15, Offset::new(i))
                .await
                .unwrap();
        }
        let infos = manager.chunk_infos();
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].message_count, 5);
        assert_eq!(infos[0].bytes_indexed, 75);
        assert_eq!(infos[0].state, ChunkState::Live);
    }

    #[tokio::test]
    async fn byte_threshold_rolls_over_and_starts_a_fresh_active_chunk() {
        // Threshold = 100 bytes, records of 15 bytes each: rollover fires after record 7
        // (105 bytes >= 100), and again after record 14 (7 more records, another 105 bytes).
        let manager = test_manager(100, 1_000_000);

        for i in 0..10u64 {
            manager
                .add_message(&FakeRecord { timestamp_epoch_ms: 1_000_000 + i as i64 }, 15, Offset::new(i))
                .await
                .unwrap();
        }

        // Allow the spawned rollover tasks to run to completion.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let infos = manager.chunk_infos();
        assert_eq!(infos.len(), 2, "expected exactly one rollover by record 10");

        let uploaded: Vec<_> = infos.iter().filter(|c| c.state == ChunkState::Uploaded).collect();
        let live: Vec<_> = infos.iter().filter(|c| c.state == ChunkState::Live).collect();
        assert_eq!(uploaded.len(), 1);
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].bytes_indexed, 45);
        assert!(!manager.ingestion_stopped());
    }

    #[tokio::test]
    async fn query_only_dispatches_to_overlapping_chunks() {
        let manager = test_manager(1_000_000, 1_000_000);
        manager
            .add_message(&FakeRecord { timestamp_epoch_ms: 1_000_000_000 }, 10, Offset::new(0))
            .await
            .unwrap();

        let query = Query {
            start_epoch_s: 1_000_000,
            end_epoch_s: 1_000_000,
            query_string: String::new(),
            how_many: 10,
            buckets: Vec::new(),
        };
        let result = manager.query(query).await;
        assert_eq!(result.hits.len(), 1);
        assert_eq!(result.failed_chunks, 0);

        let non_overlapping = Query {
            start_epoch_s: 1,
            end_epoch_s: 2,
            query_string: String::new(),
            how_many: 10,
            buckets: Vec::new(),
        };
        let result = manager.query(non_overlapping).await;
        assert_eq!(result.hits.len(), 0);
    }

    #[tokio::test]
    async fn add_message_rejected_once_ingestion_is_stopped() {
        let manager = test_manager(1_000_000, 1_000_000);
        manager.stop_ingestion();
        let err = manager
            .add_message(&FakeRecord { timestamp_epoch_ms: 1 }, 10, Offset::new(0))
            .await
            .unwrap_err();
        assert_matches::assert_matches!(err, ChunkManagerError::IngestionStopped);
    }

    #[tokio::test]
    async fn externally_shared_arrest_flag_stops_ingestion() {
        // Mirrors how bootstrap wires a metadata store session-expiry handler: it shares this
        // same flag rather than going through the manager at all.
        let shared_flag = Arc::new(AtomicBool::new(false));
        let store: Arc<DynObjectStore> = Arc::new(InMemory::new());
        let blob_store = BlobStoreGateway::new(store, BackoffConfig::default());
        let time_provider: TimeProviderRef =
            Arc::new(MockProvider::new(Time::from_timestamp_secs(1_000)));
        let registry = Registry::new();
        let manager = ChunkManager::new(
            "test",
            "/logdex",
            Box::new(|| Box::new(FakeIndex { appended: PLMutex::new(Vec::new()) })),
            Arc::new(ThresholdRolloverStrategy::new(1_000_000, 1_000_000)),
            blob_store,
            None,
            time_provider,
            Duration::from_secs(5),
            &registry,
            Arc::clone(&shared_flag),
        );

        assert!(!manager.ingestion_stopped());
        shared_flag.store(true, Ordering::Release);
        assert!(manager.ingestion_stopped());
    }

    #[tokio::test]
    async fn close_rolls_over_the_active_chunk_and_closes_everything() {
        let manager = test_manager(1_000_000, 1_000_000);
        manager
            .add_message(&FakeRecord { timestamp_epoch_ms: 1 }, 10, Offset::new(0))
            .await
            .unwrap();
        manager.close().await;

        let infos = manager.chunk_infos();
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].state, ChunkState::Uploaded);
    }
}
