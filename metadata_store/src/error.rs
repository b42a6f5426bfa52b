use crate::backend::BackendError;

/// Public failure mode of a [`crate::MetadataStore`] operation, after retries are exhausted.
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    /// The operation targeted a path that already has a node.
    #[error("node already exists: {0}")]
    NodeExists(String),
    /// The operation targeted a node (or a required parent) that does not exist.
    #[error("no such node: {0}")]
    NoNode(String),
    /// The coordination service remained unreachable through every configured retry.
    #[error("metadata store unavailable after retries: {0}")]
    Internal(String),
}

impl From<BackendError> for MetadataError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::NodeExists(path) => Self::NodeExists(path),
            BackendError::NoNode(path) => Self::NoNode(path),
            BackendError::HasChildren(path) => Self::Internal(format!("has children: {path}")),
            BackendError::Invalid(msg) => Self::Internal(msg),
            BackendError::Service(msg) => Self::Internal(msg),
        }
    }
}
