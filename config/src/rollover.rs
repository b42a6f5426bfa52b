use std::time::Duration;

/// Rollover admission-control thresholds and timeouts.
#[derive(Debug, Clone, clap::Parser)]
pub struct RolloverConfig {
    /// Roll a chunk over once it has indexed at least this many bytes.
    #[clap(
        long = "rollover-bytes-threshold",
        env = "LOGDEX_ROLLOVER_BYTES_THRESHOLD",
        default_value = "1073741824"
    )]
    pub rollover_bytes_threshold: u64,

    /// Roll a chunk over once it has indexed at least this many messages.
    #[clap(
        long = "rollover-messages-threshold",
        env = "LOGDEX_ROLLOVER_MESSAGES_THRESHOLD",
        default_value = "5000000"
    )]
    pub rollover_messages_threshold: u64,

    /// How long `close()` waits for an in-flight rollover before forcing executor shutdown.
    #[clap(
        long = "rollover-future-timeout-ms",
        env = "LOGDEX_ROLLOVER_FUTURE_TIMEOUT_MS",
        default_value = "30000"
    )]
    pub rollover_future_timeout_ms: u64,
}

impl RolloverConfig {
    /// [`RolloverConfig::rollover_future_timeout_ms`] as a [`Duration`].
    pub fn rollover_future_timeout(&self) -> Duration {
        Duration::from_millis(self.rollover_future_timeout_ms)
    }
}
