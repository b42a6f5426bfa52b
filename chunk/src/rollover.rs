use crate::chunk::Chunk;
use blob_store::BlobStoreGateway;
use metadata_store::{MetadataStore, NodeMode};
use observability_deps::tracing::{error, info, warn};
use std::sync::Arc;

/// Pure, synchronous predicate over a chunk's post-append counters deciding whether it should be
/// rolled over. The core admits any predicate that is monotone non-decreasing in both axes, to
/// avoid oscillation between rolling over and not.
pub trait RolloverStrategy: Send + Sync + std::fmt::Debug {
    /// Whether a chunk with these counters should be rolled over.
    fn should_roll_over(&self, bytes_indexed: u64, messages_indexed: u64) -> bool;
}

/// Roll over once either threshold is met.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdRolloverStrategy {
    /// Roll over once a chunk's indexed byte count reaches this value.
    pub bytes_threshold: u64,
    /// Roll over once a chunk's indexed message count reaches this value.
    pub messages_threshold: u64,
}

impl ThresholdRolloverStrategy {
    /// A strategy that rolls over on either threshold.
    pub fn new(bytes_threshold: u64, messages_threshold: u64) -> Self {
        Self {
            bytes_threshold,
            messages_threshold,
        }
    }
}

impl RolloverStrategy for ThresholdRolloverStrategy {
    fn should_roll_over(&self, bytes_indexed: u64, messages_indexed: u64) -> bool {
        bytes_indexed >= self.bytes_threshold || messages_indexed >= self.messages_threshold
    }
}

/// Seals a chunk, uploads its snapshot to the blob store, and records the outcome in both the
/// chunk's in-memory metadata and the cluster-visible metadata store.
///
/// Steps, each either succeeding or failing the whole task: commit the index store, take a
/// snapshot, upload the snapshot's files, release the snapshot, mark the chunk `Uploaded` (or
/// `Failed` on any prior step's failure). The chunk's transition to `ReadOnly` happens
/// synchronously before this task starts, so it is durable regardless of how the task concludes.
#[derive(Debug)]
pub struct RolloverTask {
    chunk: Arc<Chunk>,
    blob_store: BlobStoreGateway,
    metadata_store: Option<MetadataStore>,
    chunk_data_prefix: String,
    metadata_path_prefix: String,
}

impl RolloverTask {
    /// Build a rollover task for `chunk`. `metadata_store`, when given, receives a best-effort
    /// write of the chunk's updated catalog record, namespaced under `metadata_path_prefix`; a
    /// write failure there is logged, not fatal.
    pub fn new(
        chunk: Arc<Chunk>,
        blob_store: BlobStoreGateway,
        metadata_store: Option<MetadataStore>,
        chunk_data_prefix: String,
        metadata_path_prefix: String,
    ) -> Self {
        Self {
            chunk,
            blob_store,
            metadata_store,
            chunk_data_prefix,
            metadata_path_prefix,
        }
    }

    /// Run the rollover to completion, returning whether it succeeded. Never propagates an
    /// error out of this method; the chunk's own state (`Uploaded`/`Failed`) is the result.
    pub async fn run(self) -> bool {
        let chunk_id = self.chunk.id();
        info!(%chunk_id, "rollover started");

        let outcome = self.try_upload().await;

        match outcome {
            Ok(snapshot_path) => {
                self.chunk.mark_uploaded(snapshot_path);
                info!(%chunk_id, "rollover finished successfully");
                self.write_catalog_entry().await;
                true
            }
            Err(reason) => {
                self.chunk.mark_failed();
                error!(%chunk_id, %reason, "rollover failed");
                self.write_catalog_entry().await;
                false
            }
        }
    }

    async fn try_upload(&self) -> Result<String, String> {
        let chunk_id = self.chunk.id();

        let snapshot = self
            .chunk
            .take_snapshot()
            .await
            .map_err(|e| format!("snapshot failed: {e}"))?;

        let files = snapshot
            .files()
            .await
            .map_err(|e| format!("listing snapshot files failed: {e}"))?;

        let upload_result = self
            .blob_store
            .upload_snapshot(&chunk_id.to_string(), files)
            .await;

        // The scoped-resource rule applies regardless of upload outcome.
        if let Err(e) = Chunk::release_snapshot(snapshot).await {
            warn!(%chunk_id, error = %e, "failed to release index snapshot after rollover");
        }

        let uploaded = upload_result.map_err(|e| format!("upload failed: {e}"))?;
        Ok(format!("{}/{}", self.chunk_data_prefix, uploaded.join(",")))
    }

    async fn write_catalog_entry(&self) {
        let Some(metadata_store) = &self.metadata_store else {
            return;
        };
        let info = self.chunk.info();
        let prefix = self.metadata_path_prefix.trim_end_matches('/');
        let path = format!("{prefix}/chunks/{}", info.chunk_id);
        let data = format!("{info:?}").into_bytes();

        if metadata_store.put(&path, data.clone()).await.is_ok() {
            return;
        }
        if let Err(e) = metadata_store
            .create(&path, data, true, NodeMode::Persistent)
            .await
        {
            warn!(chunk_id = %info.chunk_id, error = %e, "best-effort catalog write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index_store::{IndexAppendError, IndexError, IndexSnapshot, IndexStore};
    use async_trait::async_trait;
    use bytes::Bytes;
    use clock::{MockProvider, Time};
    use data_types::{Hit, Query};
    use object_store::memory::InMemory;

    #[test]
    fn threshold_strategy_is_monotone() {
        let strategy = ThresholdRolloverStrategy::new(100, 10);
        assert!(!strategy.should_roll_over(50, 5));
        assert!(strategy.should_roll_over(100, 5));
        assert!(strategy.should_roll_over(50, 10));
        assert!(strategy.should_roll_over(200, 20));
    }

    #[derive(Debug)]
    struct EmptyIndex;

    #[derive(Debug)]
    struct EmptySnapshot;

    #[async_trait]
    impl IndexSnapshot for EmptySnapshot {
        async fn files(&self) -> Result<Vec<(String, Bytes)>, IndexError> {
            Ok(vec![("segment.dat".to_string(), Bytes::from_static(b"x"))])
        }

        async fn release(self: Box<Self>) -> Result<(), IndexError> {
            Ok(())
        }
    }

    #[async_trait]
    impl IndexStore for EmptyIndex {
        async fn append(&self, _record: Bytes) -> Result<(), IndexAppendError> {
            Ok(())
        }

        async fn query(&self, _query: &Query) -> Result<Vec<Hit>, IndexError> {
            Ok(Vec::new())
        }

        async fn commit(&self) -> Result<(), IndexError> {
            Ok(())
        }

        async fn take_snapshot(&self) -> Result<Box<dyn IndexSnapshot>, IndexError> {
            Ok(Box::new(EmptySnapshot))
        }

        async fn close(&self) -> Result<(), IndexError> {
            Ok(())
        }

        async fn cleanup(&self) -> Result<(), IndexError> {
            Ok(())
        }
    }

    fn test_chunk() -> Arc<Chunk> {
        let clock = Arc::new(MockProvider::new(Time::from_timestamp_secs(0)));
        Arc::new(Chunk::new("test", Box::new(EmptyIndex), clock))
    }

    #[tokio::test]
    async fn successful_rollover_marks_chunk_uploaded() {
        let chunk = test_chunk();
        chunk.mark_read_only();
        let gateway = BlobStoreGateway::new(
            Arc::new(InMemory::new()),
            backoff::BackoffConfig::default(),
        );
        let task = RolloverTask::new(
            Arc::clone(&chunk),
            gateway,
            None,
            "logdex".to_string(),
            "/logdex".to_string(),
        );
        assert!(task.run().await);
        assert_eq!(chunk.info().state, data_types::ChunkState::Uploaded);
        assert!(chunk.info().snapshot_path.is_some());
    }

    #[derive(Debug)]
    struct FailingSnapshotIndex;

    #[async_trait]
    impl IndexStore for FailingSnapshotIndex {
        async fn append(&self, _record: Bytes) -> Result<(), IndexAppendError> {
            Ok(())
        }

        async fn query(&self, _query: &Query) -> Result<Vec<Hit>, IndexError> {
            Ok(Vec::new())
        }

        async fn commit(&self) -> Result<(), IndexError> {
            Ok(())
        }

        async fn take_snapshot(&self) -> Result<Box<dyn IndexSnapshot>, IndexError> {
            Err(IndexError::SnapshotFailed("disk full".to_string()))
        }

        async fn close(&self) -> Result<(), IndexError> {
            Ok(())
        }

        async fn cleanup(&self) -> Result<(), IndexError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn snapshot_failure_marks_chunk_failed() {
        let clock = Arc::new(MockProvider::new(Time::from_timestamp_secs(0)));
        let chunk = Arc::new(Chunk::new("test", Box::new(FailingSnapshotIndex), clock));
        chunk.mark_read_only();
        let gateway = BlobStoreGateway::new(
            Arc::new(InMemory::new()),
            backoff::BackoffConfig::default(),
        );
        let task = RolloverTask::new(
            Arc::clone(&chunk),
            gateway,
            None,
            "logdex".to_string(),
            "/logdex".to_string(),
        );
        assert!(!task.run().await);
        assert_eq!(chunk.info().state, data_types::ChunkState::Failed);
    }
}
