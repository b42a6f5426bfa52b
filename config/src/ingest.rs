use std::path::PathBuf;

/// Where and under what logical namespace chunks are ingested.
#[derive(Debug, Clone, clap::Parser)]
pub struct IngestConfig {
    /// On-disk and metadata-catalog namespace chunks are created under.
    #[clap(long = "chunk-data-prefix", env = "LOGDEX_CHUNK_DATA_PREFIX", default_value = "logdex")]
    pub chunk_data_prefix: String,

    /// Directory under which per-chunk index directories are created.
    #[clap(long = "data-directory", env = "LOGDEX_DATA_DIRECTORY", default_value = "./data")]
    pub data_directory: PathBuf,
}
