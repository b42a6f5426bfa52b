//! A single append-only index shard (the [`Chunk`]), the out-of-scope [`IndexStore`] contract it
//! is built on, and the background task that seals and uploads a chunk once it is full.
#![warn(missing_docs, missing_debug_implementations)]

mod chunk;
mod index_store;
mod rollover;

pub use chunk::{Chunk, SharedChunk};
pub use index_store::{IndexAppendError, IndexError, IndexSnapshot, IndexStore};
pub use rollover::{RolloverStrategy, RolloverTask, ThresholdRolloverStrategy};
