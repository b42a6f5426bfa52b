//! A hierarchical, session-scoped coordination store: the chunk catalog (persistent
//! `/chunks/<chunk-id>` nodes) and per-node liveness registration (ephemeral nodes) both live
//! here, backed in production by ZooKeeper and in tests by an in-process cluster with the same
//! semantics.
#![warn(missing_docs, missing_debug_implementations)]

mod backend;
mod error;
mod fatal;
mod memory;
mod store;
mod zk;

pub use backend::{Backend, BackendError, NodeMode};
pub use error::MetadataError;
pub use fatal::{FatalErrorHandler, ProcessExitHandler, RecordingHandler};
pub use memory::{InMemoryBackend, InMemoryCluster};
pub use store::{MetadataStore, RetryPolicy};
pub use zk::ZooKeeperBackend;
