//! Wires a single logdex node process together: config parsing has already happened by the
//! time [`run`] is called; from here it is metric registry, metadata store, blob store, chunk
//! manager construction, then block until a shutdown signal arrives.

use crate::index::FileIndexStore;
use chunk::ThresholdRolloverStrategy;
use chunk_manager::ChunkManager;
use clock::{SystemProvider, TimeProviderRef};
use config::Config;
use metadata_store::{FatalErrorHandler, MetadataStore, ZooKeeperBackend};
use metric::Registry;
use object_store::{aws::AmazonS3Builder, DynObjectStore};
use observability_deps::tracing::{error, info};
use snafu::{ResultExt, Snafu};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

#[derive(Debug, Snafu)]
#[allow(missing_docs)]
pub enum Error {
    #[snafu(display("could not build the blob store: {}", source))]
    BlobStore { source: object_store::Error },

    #[snafu(display("timed out after {:?} connecting to the metadata store", timeout))]
    MetadataStoreConnectTimedOut { timeout: std::time::Duration },

    #[snafu(display("could not connect to the metadata store: {}", source))]
    MetadataStore { source: metadata_store::BackendError },

    #[snafu(display("could not install the Ctrl-C signal handler: {}", source))]
    Signal { source: std::io::Error },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Arrests ingestion through a shared flag before exiting the process. Installed as the
/// metadata store's session-expiry callback so that a lost coordination-service session stops
/// the chunk manager the same way an internal rollover failure does, rather than relying on
/// process exit alone to hide the gap.
#[derive(Debug)]
struct ArrestAndExitHandler {
    ingestion_stopped: Arc<AtomicBool>,
}

impl FatalErrorHandler for ArrestAndExitHandler {
    fn on_session_expired(&self) {
        self.ingestion_stopped.store(true, Ordering::Release);
        error!("metadata store session expired; exiting process");
        std::process::exit(1);
    }
}

/// Build every component and run until a shutdown signal arrives, then shut down cleanly.
pub async fn run(config: Config) -> Result<()> {
    let registry = Registry::new();
    let time_provider: TimeProviderRef = Arc::new(SystemProvider::new());
    let ingestion_stopped = Arc::new(AtomicBool::new(false));

    let object_store: Arc<DynObjectStore> = Arc::new(
        AmazonS3Builder::from_env()
            .with_bucket_name(&config.blob_store_config.s3_bucket)
            .build()
            .context(BlobStoreSnafu)?,
    );
    let blob_store = blob_store::BlobStoreGateway::new(object_store, Default::default());

    let metadata_store = {
        let zk_host = config.metadata_store_config.zk_host.clone();
        let session_timeout = config.metadata_store_config.session_timeout();
        let connection_timeout = config.metadata_store_config.connection_timeout();
        let backend = tokio::time::timeout(
            connection_timeout,
            tokio::task::spawn_blocking(move || ZooKeeperBackend::connect(&zk_host, session_timeout)),
        )
        .await
        .map_err(|_| Error::MetadataStoreConnectTimedOut { timeout: connection_timeout })?
        .expect("metadata store connect task panicked")
        .context(MetadataStoreSnafu)?;

        let fatal_handler: Arc<dyn FatalErrorHandler> = Arc::new(ArrestAndExitHandler {
            ingestion_stopped: Arc::clone(&ingestion_stopped),
        });
        Some(MetadataStore::new(
            Arc::new(backend),
            config.metadata_store_config.retry_policy(),
            &registry,
            fatal_handler,
        ))
    };

    let strategy = Arc::new(ThresholdRolloverStrategy::new(
        config.rollover_config.rollover_bytes_threshold,
        config.rollover_config.rollover_messages_threshold,
    ));

    let chunk_data_prefix = config.ingest_config.chunk_data_prefix.clone();
    let metadata_path_prefix = config.metadata_store_config.zk_path_prefix.clone();
    let manager = Arc::new(ChunkManager::new(
        chunk_data_prefix.clone(),
        metadata_path_prefix,
        index_store_factory(config.ingest_config.data_directory.clone(), chunk_data_prefix),
        strategy,
        blob_store,
        metadata_store,
        Arc::clone(&time_provider),
        config.rollover_config.rollover_future_timeout(),
        &registry,
        ingestion_stopped,
    ));

    info!("logdex node started, awaiting shutdown signal");
    tokio::signal::ctrl_c().await.context(SignalSnafu)?;
    info!("shutdown signal received, closing chunk manager");

    manager.close().await;
    info!("logdex node shut down cleanly");
    Ok(())
}

/// Builds a fresh [`FileIndexStore`] under `data_directory/prefix` for every new active chunk.
fn index_store_factory(
    data_directory: std::path::PathBuf,
    prefix: String,
) -> chunk_manager::IndexStoreFactory {
    Box::new(move || {
        Box::new(FileIndexStore::new(&data_directory, &prefix))
            as Box<dyn chunk::IndexStore>
    })
}
