//! Command-line/environment configuration for the logdex node process.
//!
//! One `clap::Parser` struct per concern (ingest, rollover, blob store, metadata store,
//! logging), each `#[clap(flatten)]`ed into the top-level [`Config`]. Every flag is also
//! settable by environment variable; a `.env` file in the working directory is sourced before
//! flag parsing, at the lowest precedence.
#![warn(missing_docs, missing_debug_implementations)]

mod blob_store;
mod ingest;
mod logging;
mod metadata_store;
mod rollover;

pub use blob_store::BlobStoreConfig;
pub use ingest::IngestConfig;
pub use logging::LoggingConfig;
pub use metadata_store::MetadataStoreConfig;
pub use rollover::RolloverConfig;

/// The full configuration for one logdex node process.
#[derive(Debug, Clone, clap::Parser)]
#[clap(
    name = "logdex",
    about = "Runs a single logdex log-indexing node",
    long_about = "Run the logdex ingestion-and-search node.\n\nConfiguration is loaded from the \
    following sources (highest precedence first):\n\
        - command line arguments\n\
        - user set environment variables\n\
        - .env file contents\n\
        - pre-configured default values"
)]
pub struct Config {
    /// Logging configuration.
    #[clap(flatten)]
    pub logging_config: LoggingConfig,

    /// Ingestion and on-disk layout configuration.
    #[clap(flatten)]
    pub ingest_config: IngestConfig,

    /// Rollover admission-control configuration.
    #[clap(flatten)]
    pub rollover_config: RolloverConfig,

    /// Blob store destination configuration.
    #[clap(flatten)]
    pub blob_store_config: BlobStoreConfig,

    /// Metadata store (coordination service) connection configuration.
    #[clap(flatten)]
    pub metadata_store_config: MetadataStoreConfig,
}

impl Config {
    /// Parse configuration from `std::env::args`, sourcing a `.env` file first (if present) at
    /// the lowest precedence.
    pub fn load() -> Self {
        if let Err(err) = dotenvy::dotenv() {
            if !err.not_found() {
                observability_deps::tracing::warn!(%err, "failed to load .env file");
            }
        }
        <Self as clap::Parser>::parse()
    }
}
