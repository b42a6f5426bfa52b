//! A minimal, on-disk line-oriented [`IndexStore`] implementation: not the focus of this crate
//! (the inverted-index engine itself is out of scope for the core), but enough to make the
//! `logdex` binary actually runnable end to end rather than requiring an external engine.

use async_trait::async_trait;
use bytes::Bytes;
use chunk::{IndexAppendError, IndexError, IndexSnapshot, IndexStore};
use data_types::{Hit, Query};
use parking_lot::Mutex;
use std::path::PathBuf;
use tokio::{
    fs,
    io::{AsyncReadExt, AsyncWriteExt},
};
use uuid::Uuid;

const DATA_FILE_NAME: &str = "data.log";

/// A single chunk's index, backed by one append-only file of newline-delimited records under
/// `<data_directory>/<prefix>/<a fresh directory name>/data.log`. Querying is a linear substring
/// scan; this is adequate for small chunks and for exercising the rest of the system, not for
/// production search volume.
#[derive(Debug)]
pub struct FileIndexStore {
    dir: PathBuf,
    buffered: Mutex<Vec<Bytes>>,
}

impl FileIndexStore {
    /// A fresh index under a freshly minted directory name rooted at `data_directory/prefix`.
    /// Deliberately not keyed by the owning [`chunk::Chunk`]'s id: that id is only assigned once
    /// the chunk is constructed, after the index store it wraps already exists.
    pub fn new(data_directory: &std::path::Path, prefix: &str) -> Self {
        Self {
            dir: data_directory.join(prefix).join(Uuid::new_v4().to_string()),
            buffered: Mutex::new(Vec::new()),
        }
    }

    fn data_path(&self) -> PathBuf {
        self.dir.join(DATA_FILE_NAME)
    }
}

#[async_trait]
impl IndexStore for FileIndexStore {
    async fn append(&self, record: Bytes) -> Result<(), IndexAppendError> {
        self.buffered.lock().push(record);
        Ok(())
    }

    async fn query(&self, query: &Query) -> Result<Vec<Hit>, IndexError> {
        let contents = fs::read(self.data_path())
            .await
            .map_err(|e| IndexError::QueryFailed(e.to_string()))?;

        let mut hits = Vec::new();
        for (i, line) in contents.split(|&b| b == b'\n').enumerate() {
            if line.is_empty() {
                continue;
            }
            if query.query_string.is_empty()
                || line
                    .windows(query.query_string.len().max(1))
                    .any(|w| w == query.query_string.as_bytes())
            {
                hits.push(Hit {
                    sort_key: i as i64,
                    payload: line.to_vec(),
                });
            }
        }
        Ok(hits)
    }

    async fn commit(&self) -> Result<(), IndexError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| IndexError::CommitFailed(e.to_string()))?;

        let mut buffered = self.buffered.lock();
        if buffered.is_empty() {
            return Ok(());
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.data_path())
            .await
            .map_err(|e| IndexError::CommitFailed(e.to_string()))?;

        for record in buffered.drain(..) {
            file.write_all(&record)
                .await
                .map_err(|e| IndexError::CommitFailed(e.to_string()))?;
            file.write_all(b"\n")
                .await
                .map_err(|e| IndexError::CommitFailed(e.to_string()))?;
        }
        file.flush()
            .await
            .map_err(|e| IndexError::CommitFailed(e.to_string()))?;
        Ok(())
    }

    async fn take_snapshot(&self) -> Result<Box<dyn IndexSnapshot>, IndexError> {
        let mut contents = Vec::new();
        if let Ok(mut file) = fs::File::open(self.data_path()).await {
            file.read_to_end(&mut contents)
                .await
                .map_err(|e| IndexError::SnapshotFailed(e.to_string()))?;
        }
        Ok(Box::new(FileIndexSnapshot {
            files: vec![(DATA_FILE_NAME.to_string(), Bytes::from(contents))],
        }))
    }

    async fn close(&self) -> Result<(), IndexError> {
        Ok(())
    }

    async fn cleanup(&self) -> Result<(), IndexError> {
        match fs::remove_dir_all(&self.dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(IndexError::CloseFailed(e.to_string())),
        }
    }
}

#[derive(Debug)]
struct FileIndexSnapshot {
    files: Vec<(String, Bytes)>,
}

#[async_trait]
impl IndexSnapshot for FileIndexSnapshot {
    async fn files(&self) -> Result<Vec<(String, Bytes)>, IndexError> {
        Ok(self.files.clone())
    }

    async fn release(self: Box<Self>) -> Result<(), IndexError> {
        Ok(())
    }
}
