//! A thin gateway over a general-purpose object-storage client, used by the rollover task to
//! upload sealed chunk snapshots and by stale-chunk eviction to delete them.
#![warn(missing_docs, missing_debug_implementations)]

mod error;
mod gateway;

pub use error::BlobStoreError;
pub use gateway::BlobStoreGateway;

pub use object_store::{self, DynObjectStore};
