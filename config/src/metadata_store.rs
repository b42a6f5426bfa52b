use metadata_store::RetryPolicy;
use std::time::Duration;

/// Connection parameters for the backing coordination service (ZooKeeper in production).
#[derive(Debug, Clone, clap::Parser)]
pub struct MetadataStoreConfig {
    /// Comma-separated `host:port` list of the coordination service ensemble.
    #[clap(long = "zk-host", env = "LOGDEX_ZK_HOST", default_value = "localhost:2181")]
    pub zk_host: String,

    /// Namespace every metadata path is created under.
    #[clap(long = "zk-path-prefix", env = "LOGDEX_ZK_PATH_PREFIX", default_value = "/logdex")]
    pub zk_path_prefix: String,

    /// Session timeout negotiated with the coordination service.
    #[clap(
        long = "zk-session-timeout-ms",
        env = "LOGDEX_ZK_SESSION_TIMEOUT_MS",
        default_value = "30000"
    )]
    pub zk_session_timeout_ms: u64,

    /// How long to wait for the initial connection before giving up.
    #[clap(
        long = "zk-connection-timeout-ms",
        env = "LOGDEX_ZK_CONNECTION_TIMEOUT_MS",
        default_value = "10000"
    )]
    pub zk_connection_timeout_ms: u64,

    /// Number of attempts made for a single metadata store operation before it is reported as
    /// `Internal`.
    #[clap(
        long = "zk-retry-times",
        env = "LOGDEX_ZK_RETRY_TIMES",
        default_value = "3"
    )]
    pub zk_retry_times: u32,

    /// Fixed delay between retry attempts.
    #[clap(
        long = "zk-retry-delay-ms",
        env = "LOGDEX_ZK_RETRY_DELAY_MS",
        default_value = "100"
    )]
    pub zk_retry_delay_ms: u64,
}

impl MetadataStoreConfig {
    /// [`MetadataStoreConfig::zk_session_timeout_ms`] as a [`Duration`].
    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.zk_session_timeout_ms)
    }

    /// [`MetadataStoreConfig::zk_connection_timeout_ms`] as a [`Duration`].
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.zk_connection_timeout_ms)
    }

    /// The bounded retry policy derived from `zk_retry_times`/`zk_retry_delay_ms`.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.zk_retry_times, Duration::from_millis(self.zk_retry_delay_ms))
    }
}
