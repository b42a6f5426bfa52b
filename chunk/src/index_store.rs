use async_trait::async_trait;
use bytes::Bytes;
use data_types::{Hit, Query};
use std::fmt::Debug;

/// Failure appending a single record to an [`IndexStore`].
#[derive(Debug, thiserror::Error)]
pub enum IndexAppendError {
    /// The underlying index engine rejected or failed to durably apply the append.
    #[error("index append failed: {0}")]
    Backend(String),
}

/// Failure performing a search, commit, snapshot, or close against an [`IndexStore`].
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// The query could not be executed against this index.
    #[error("index query failed: {0}")]
    QueryFailed(String),
    /// Commit/flush of buffered writes failed.
    #[error("index commit failed: {0}")]
    CommitFailed(String),
    /// Taking or releasing a point-in-time snapshot failed.
    #[error("index snapshot failed: {0}")]
    SnapshotFailed(String),
    /// Closing the index or removing its on-disk state failed.
    #[error("index close/cleanup failed: {0}")]
    CloseFailed(String),
}

/// A reference-counted, point-in-time view over an index's on-disk files, held open across a
/// rollover upload so compaction or cleanup cannot delete the files out from under it.
#[async_trait]
pub trait IndexSnapshot: Send + Sync + Debug {
    /// The files making up this snapshot, as `(relative file name, contents)` pairs.
    async fn files(&self) -> Result<Vec<(String, Bytes)>, IndexError>;

    /// Release this snapshot's hold on the underlying files. Idempotent.
    async fn release(self: Box<Self>) -> Result<(), IndexError>;
}

/// The out-of-scope inverted-index engine a [`crate::Chunk`] owns exactly one instance of for
/// its entire lifetime. Specified here only by the contract the core consumes; the concrete
/// engine (Lucene-style, tantivy-backed, or otherwise) is not part of the core.
#[async_trait]
pub trait IndexStore: Send + Sync + Debug {
    /// Append one serialized record.
    async fn append(&self, record: Bytes) -> Result<(), IndexAppendError>;

    /// Execute a search against the currently committed view of this index.
    async fn query(&self, query: &Query) -> Result<Vec<Hit>, IndexError>;

    /// Flush buffered writes so they are visible to a subsequent snapshot.
    async fn commit(&self) -> Result<(), IndexError>;

    /// Take a reference-counted, point-in-time snapshot of this index's on-disk files.
    async fn take_snapshot(&self) -> Result<Box<dyn IndexSnapshot>, IndexError>;

    /// Close the index, releasing any in-memory resources. Does not remove on-disk files.
    async fn close(&self) -> Result<(), IndexError>;

    /// Remove this index's on-disk directory. Only valid after [`IndexStore::close`].
    async fn cleanup(&self) -> Result<(), IndexError>;
}
