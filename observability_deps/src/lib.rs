//! Observability ecosystem dependencies for logdex, to ensure consistent versions and unified
//! updates.
//!
//! Every crate in this workspace logs through this facade rather than depending on `tracing`
//! directly, so the backend can be swapped in one place.

pub use tracing;
