use crate::error::BlobStoreError;
use backoff::{Backoff, BackoffConfig};
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::{path::Path as ObjectPath, DynObjectStore, ObjectMeta};
use observability_deps::tracing::{debug, info};
use std::sync::Arc;

/// Uploads a sealed chunk's snapshot files to object storage, deletes a chunk's objects on
/// eviction, and lists what is currently stored under a prefix. A thin adapter over
/// `object_store`'s `DynObjectStore` trait object; only this contract is core, the concrete
/// backend (S3, GCS, local disk, in-memory) is an operator choice.
#[derive(Debug, Clone)]
pub struct BlobStoreGateway {
    store: Arc<DynObjectStore>,
    backoff_config: BackoffConfig,
}

impl BlobStoreGateway {
    /// Wrap `store`, retrying transient upload failures per `backoff_config`.
    pub fn new(store: Arc<DynObjectStore>, backoff_config: BackoffConfig) -> Self {
        Self {
            store,
            backoff_config,
        }
    }

    fn object_path(chunk_id: &str, file_name: &str) -> ObjectPath {
        ObjectPath::from(format!("{chunk_id}/{file_name}"))
    }

    /// Upload every `(file_name, contents)` pair under `<chunk_id>/<file_name>`, retrying each
    /// individual upload with exponential backoff and jitter for transient I/O errors.
    pub async fn upload_snapshot(
        &self,
        chunk_id: &str,
        files: Vec<(String, Bytes)>,
    ) -> Result<Vec<String>, BlobStoreError> {
        let mut uploaded = Vec::with_capacity(files.len());
        for (file_name, contents) in files {
            let location = Self::object_path(chunk_id, &file_name);
            let mut backoff = Backoff::new(&self.backoff_config);
            let store = Arc::clone(&self.store);
            let location_for_retry = location.clone();
            let contents_for_retry = contents.clone();
            // `retry_all_errors` is infallible: it retries transient object store errors
            // forever with exponential backoff rather than surfacing them.
            let std::result::Result::Ok(()) = backoff
                .retry_all_errors("upload chunk snapshot file", move || {
                    let store = Arc::clone(&store);
                    let location = location_for_retry.clone();
                    let contents = contents_for_retry.clone();
                    async move { store.put(&location, contents).await }
                })
                .await;
            debug!(%chunk_id, %file_name, "uploaded chunk snapshot file");
            uploaded.push(format!("{chunk_id}/{file_name}"));
        }
        info!(%chunk_id, file_count = uploaded.len(), "uploaded chunk snapshot");
        Ok(uploaded)
    }

    /// Delete every object stored under `<chunk_id>/`.
    pub async fn delete_prefix(&self, chunk_id: &str) -> Result<(), BlobStoreError> {
        let prefix = ObjectPath::from(chunk_id.to_string());
        let objects: Vec<ObjectMeta> = self
            .store
            .list(Some(&prefix))
            .await?
            .try_collect()
            .await?;
        for object in objects {
            self.store.delete(&object.location).await?;
        }
        info!(%chunk_id, "deleted chunk objects");
        Ok(())
    }

    /// List the object keys currently stored under `prefix`.
    pub async fn list_objects(&self, prefix: &str) -> Result<Vec<String>, BlobStoreError> {
        let prefix = ObjectPath::from(prefix.to_string());
        let objects: Vec<ObjectMeta> = self
            .store
            .list(Some(&prefix))
            .await?
            .try_collect()
            .await?;
        Ok(objects.into_iter().map(|o| o.location.to_string()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;

    fn gateway() -> BlobStoreGateway {
        BlobStoreGateway::new(Arc::new(InMemory::new()), BackoffConfig::default())
    }

    #[tokio::test]
    async fn upload_then_list_round_trips() {
        let gateway = gateway();
        let uploaded = gateway
            .upload_snapshot(
                "chunk-1",
                vec![
                    ("segment.idx".to_string(), Bytes::from_static(b"idx")),
                    ("segment.meta".to_string(), Bytes::from_static(b"meta")),
                ],
            )
            .await
            .unwrap();
        assert_eq!(uploaded.len(), 2);

        let listed = gateway.list_objects("chunk-1").await.unwrap();
        assert_eq!(listed.len(), 2);
    }

    #[tokio::test]
    async fn delete_prefix_removes_all_objects() {
        let gateway = gateway();
        gateway
            .upload_snapshot("chunk-2", vec![("a".to_string(), Bytes::from_static(b"a"))])
            .await
            .unwrap();
        gateway.delete_prefix("chunk-2").await.unwrap();
        assert!(gateway.list_objects("chunk-2").await.unwrap().is_empty());
    }
}
