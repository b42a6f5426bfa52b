use observability_deps::tracing;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Logging configuration, flattened into the top-level [`crate::Config`]. Built directly on
/// `tracing-subscriber`.
#[derive(Debug, Clone, clap::Parser)]
pub struct LoggingConfig {
    /// Logging filter, in `tracing-subscriber`'s `EnvFilter` syntax (e.g. `info,chunk_manager=debug`).
    #[clap(long = "log-filter", env = "LOGDEX_LOG_FILTER", default_value = "info")]
    pub log_filter: String,
}

impl LoggingConfig {
    /// Install a global `tracing` subscriber built from this configuration. Call exactly once,
    /// before constructing any other component.
    pub fn init(&self) {
        let filter = EnvFilter::try_new(&self.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));
        let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
        if tracing::subscriber::set_global_default(subscriber).is_err() {
            tracing::warn!("global tracing subscriber already set");
        }
    }
}
