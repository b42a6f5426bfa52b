use crate::{
    backend::{Backend, BackendError, NodeMode},
    error::MetadataError,
    fatal::FatalErrorHandler,
};
use metric::{Attributes, Metric, Registry, U64Counter};
use observability_deps::tracing::warn;
use std::{sync::Arc, time::Duration};
use tokio::time::sleep;

/// Bounded retry policy applied to every operation against the backing coordination service:
/// retry up to `max_attempts` times total, sleeping `delay` between attempts. Distinct from the
/// unbounded exponential backoff used for blob-store uploads, matching the store's own
/// `zk_retry_policy (n-times, ms)` configuration knob.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total number of attempts made before giving up, including the first.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    /// A policy with `max_attempts` attempts, `delay` apart.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self { max_attempts, delay }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(100))
    }
}

#[derive(Debug)]
struct Metrics {
    reads: Metric<U64Counter>,
    writes: Metric<U64Counter>,
    failed: Metric<U64Counter>,
    zk_failed: Metric<U64Counter>,
}

impl Metrics {
    fn new(registry: &Registry) -> Self {
        Self {
            reads: registry.register_metric("metadata.read", "metadata store read calls"),
            writes: registry.register_metric("metadata.write", "metadata store write calls"),
            failed: registry.register_metric(
                "metadata.failed",
                "metadata store operations that failed on a non-transient backend error",
            ),
            zk_failed: registry.register_metric(
                "metadata.failed.zk",
                "metadata store operations that failed on a transient backend error, \
                 whether retried or exhausting all retries",
            ),
        }
    }
}

/// Async facade over a blocking [`Backend`], retrying transient failures and recording metrics.
/// Every method dispatches the blocking call via `tokio::task::spawn_blocking`.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    backend: Arc<dyn Backend>,
    retry: RetryPolicy,
    metrics: Arc<Metrics>,
}

impl MetadataStore {
    /// Wrap `backend` with the given retry policy, registering its metrics on `registry`.
    /// `fatal_handler` is installed as the backend's session-expiry callback.
    pub fn new(
        backend: Arc<dyn Backend>,
        retry: RetryPolicy,
        registry: &Registry,
        fatal_handler: Arc<dyn FatalErrorHandler>,
    ) -> Self {
        backend.on_session_expired(Box::new(move || {
            fatal_handler.on_session_expired();
        }));
        Self {
            backend,
            retry,
            metrics: Arc::new(Metrics::new(registry)),
        }
    }

    async fn with_retry<T, F>(&self, op_name: &'static str, f: F) -> Result<T, MetadataError>
    where
        F: Fn(Arc<dyn Backend>) -> Result<T, BackendError> + Send + Sync + 'static,
        T: Send + 'static,
    {
        let f = Arc::new(f);
        let mut last_err = None;
        for attempt in 1..=self.retry.max_attempts {
            let backend = Arc::clone(&self.backend);
            let f = Arc::clone(&f);
            let result = tokio::task::spawn_blocking(move || f(backend))
                .await
                .map_err(|e| BackendError::Service(format!("blocking task panicked: {e}")))
                .and_then(|r| r);

            match result {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.retry.max_attempts => {
                    self.metrics
                        .zk_failed
                        .recorder(Attributes::from([("op", op_name)]))
                        .inc(1);
                    warn!(op = op_name, attempt, error = %err, "metadata store operation failed, retrying");
                    last_err = Some(err);
                    sleep(self.retry.delay).await;
                }
                Err(err) => {
                    last_err = Some(err);
                    break;
                }
            }
        }

        let last_err = last_err.expect("loop always assigns an error before exiting without returning Ok");
        if last_err.is_transient() {
            self.metrics
                .zk_failed
                .recorder(Attributes::from([("op", op_name)]))
                .inc(1);
        } else {
            self.metrics
                .failed
                .recorder(Attributes::from([("op", op_name)]))
                .inc(1);
        }
        Err(last_err.into())
    }

    /// Create a node.
    pub async fn create(
        &self,
        path: &str,
        data: Vec<u8>,
        create_parents: bool,
        mode: NodeMode,
    ) -> Result<(), MetadataError> {
        self.metrics
            .writes
            .recorder(Attributes::from([("op", "create")]))
            .inc(1);
        let path = path.to_string();
        self.with_retry("create", move |backend| {
            backend.create(&path, data.clone(), create_parents, mode)
        })
        .await
    }

    /// Overwrite an existing node's data.
    pub async fn put(&self, path: &str, data: Vec<u8>) -> Result<(), MetadataError> {
        self.metrics
            .writes
            .recorder(Attributes::from([("op", "put")]))
            .inc(1);
        let path = path.to_string();
        self.with_retry("put", move |backend| backend.put(&path, data.clone()))
            .await
    }

    /// Read a node's data.
    pub async fn get(&self, path: &str) -> Result<Vec<u8>, MetadataError> {
        self.metrics
            .reads
            .recorder(Attributes::from([("op", "get")]))
            .inc(1);
        let path = path.to_string();
        self.with_retry("get", move |backend| backend.get(&path)).await
    }

    /// Whether a node exists.
    pub async fn exists(&self, path: &str) -> Result<bool, MetadataError> {
        self.metrics
            .reads
            .recorder(Attributes::from([("op", "exists")]))
            .inc(1);
        let path = path.to_string();
        self.with_retry("exists", move |backend| backend.exists(&path))
            .await
    }

    /// Delete a childless node.
    pub async fn delete(&self, path: &str) -> Result<(), MetadataError> {
        self.metrics
            .writes
            .recorder(Attributes::from([("op", "delete")]))
            .inc(1);
        let path = path.to_string();
        self.with_retry("delete", move |backend| backend.delete(&path))
            .await
    }

    /// List a node's immediate children.
    pub async fn get_children(&self, path: &str) -> Result<Vec<String>, MetadataError> {
        self.metrics
            .reads
            .recorder(Attributes::from([("op", "get_children")]))
            .inc(1);
        let path = path.to_string();
        self.with_retry("get_children", move |backend| backend.get_children(&path))
            .await
    }

    /// Close the underlying session gracefully.
    pub fn close(&self) {
        self.backend.close();
    }
}
