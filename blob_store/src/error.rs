/// Failure mode of a [`crate::BlobStoreGateway`] operation.
#[derive(Debug, thiserror::Error)]
pub enum BlobStoreError {
    /// Reading a local file destined for upload failed.
    #[error("failed to read local file {path}: {source}")]
    LocalIo {
        /// The local path that could not be read.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The backing object store rejected or could not complete the request, after retries.
    #[error("object store operation failed: {0}")]
    Backend(#[from] object_store::Error),
}
