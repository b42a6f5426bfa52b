use metric::{Attributes, Metric, Registry, U64Counter, U64Gauge};

#[derive(Debug)]
pub(crate) struct ChunkManagerMetrics {
    pub(crate) live_messages_indexed: U64Gauge,
    pub(crate) live_bytes_indexed: U64Gauge,
    pub(crate) rollover_success: U64Counter,
    pub(crate) rollover_failure: U64Counter,
}

impl ChunkManagerMetrics {
    pub(crate) fn new(registry: &Registry) -> Self {
        let messages: Metric<U64Gauge> =
            registry.register_metric("live_messages_indexed", "messages indexed by the active chunk");
        let bytes: Metric<U64Gauge> =
            registry.register_metric("live_bytes_indexed", "bytes indexed by the active chunk");
        let rollovers: Metric<U64Counter> =
            registry.register_metric("chunk_manager_rollovers", "completed rollover tasks by outcome");

        Self {
            live_messages_indexed: messages.recorder(Attributes::new()),
            live_bytes_indexed: bytes.recorder(Attributes::new()),
            rollover_success: rollovers.recorder(Attributes::from([("outcome", "success")])),
            rollover_failure: rollovers.recorder(Attributes::from([("outcome", "failure")])),
        }
    }
}
