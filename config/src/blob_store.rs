/// Blob store destination for uploaded chunk snapshots.
#[derive(Debug, Clone, clap::Parser)]
pub struct BlobStoreConfig {
    /// Bucket name chunk snapshots are uploaded under.
    #[clap(long = "s3-bucket", env = "LOGDEX_S3_BUCKET")]
    pub s3_bucket: String,
}
