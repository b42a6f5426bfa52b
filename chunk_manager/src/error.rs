use chunk::IndexAppendError;

/// Failure mode of [`crate::ChunkManager::add_message`].
#[derive(Debug, thiserror::Error)]
pub enum ChunkManagerError {
    /// Ingestion has been arrested (a prior rollover failed, or the metadata store session
    /// expired). The process is expected to exit shortly after observing this.
    #[error("ingestion has been stopped")]
    IngestionStopped,

    /// The rollover predicate fired but a rollover was already in flight. Either the writer
    /// keeps ingesting into the same chunk (admission-control backpressure), or, if the
    /// rejection originated inside `do_rollover`, the manager arrests ingestion.
    #[error("a rollover is already in progress")]
    RolloverInProgress,

    /// The out-of-scope index store rejected this record.
    #[error("index append failed: {0}")]
    IndexAppend(#[from] IndexAppendError),
}

/// Failure mode of [`crate::ChunkManager::query`] for a single chunk; collected, not
/// propagated — per-chunk failures are counted in the merged [`data_types::SearchResult`].
#[derive(Debug, thiserror::Error)]
#[error("chunk query failed: {0}")]
pub struct ChunkQueryError(#[from] pub chunk::IndexError);
