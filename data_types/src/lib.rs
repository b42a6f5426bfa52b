//! Shared types passed between the chunk manager, chunk, metadata store and search crates.
//!
//! Kept dependency-light on purpose: this crate should never need to know about object
//! storage, ZooKeeper, or any particular index engine.
#![warn(missing_docs, missing_debug_implementations)]

mod chunk;
mod query;
mod record;

pub use chunk::{ChunkId, ChunkInfo, ChunkState};
pub use query::{Hit, HistogramBucket, Query, SearchResult};
pub use record::{Offset, Record};
