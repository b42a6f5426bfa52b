use std::fmt::Debug;

/// Whether a node's lifetime is tied to the creating client's session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeMode {
    /// Survives session loss; must be explicitly deleted.
    Persistent,
    /// Destroyed when the owning session ends, gracefully or otherwise.
    Ephemeral,
}

/// Failure returned by a [`Backend`] operation, before the [`crate::MetadataStore`] facade
/// classifies it into the public [`crate::MetadataError`] and updates metrics.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// `create` targeted a path that already has a node.
    #[error("node already exists: {0}")]
    NodeExists(String),
    /// The targeted node, or a required parent, does not exist.
    #[error("no such node: {0}")]
    NoNode(String),
    /// `delete` targeted a node that still has children.
    #[error("node has children: {0}")]
    HasChildren(String),
    /// Path is malformed, or a structural rule (ephemeral-as-parent) was violated.
    #[error("invalid operation: {0}")]
    Invalid(String),
    /// The backing coordination service rejected or could not complete the request. Always
    /// retryable up to the configured retry policy before being surfaced as `Internal`.
    #[error("coordination service failure: {0}")]
    Service(String),
}

impl BackendError {
    /// Service-side failures are the only ones worth retrying; structural/semantic errors
    /// (`NodeExists`, `NoNode`, ...) are stable across retries.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Service(_))
    }
}

/// A blocking client for a hierarchical, session-oriented coordination service (the role
/// ZooKeeper plays for the real deployment, and what [`crate::memory::InMemoryBackend`] plays in
/// tests).
///
/// Every method blocks the calling thread; [`crate::MetadataStore`] only ever calls these via
/// `tokio::task::spawn_blocking`.
pub trait Backend: Send + Sync + Debug + 'static {
    /// Create a node. `create_parents` may only be honored for [`NodeMode::Persistent`]; an
    /// ephemeral node's parent must already exist.
    fn create(
        &self,
        path: &str,
        data: Vec<u8>,
        create_parents: bool,
        mode: NodeMode,
    ) -> Result<(), BackendError>;

    /// Overwrite an existing node's data.
    fn put(&self, path: &str, data: Vec<u8>) -> Result<(), BackendError>;

    /// Read a node's data.
    fn get(&self, path: &str) -> Result<Vec<u8>, BackendError>;

    /// Whether a node exists at `path`.
    fn exists(&self, path: &str) -> Result<bool, BackendError>;

    /// Delete a childless node.
    fn delete(&self, path: &str) -> Result<(), BackendError>;

    /// List the immediate child names of a node.
    fn get_children(&self, path: &str) -> Result<Vec<String>, BackendError>;

    /// Install the callback invoked exactly once if this session expires involuntarily.
    /// Never invoked as part of a graceful [`Backend::close`].
    fn on_session_expired(&self, callback: Box<dyn FnOnce() + Send>);

    /// End this session gracefully: ephemeral nodes created under it are destroyed, but the
    /// expiry callback is not invoked.
    fn close(&self);
}
