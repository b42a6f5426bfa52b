//! Production [`Backend`] wrapping a real ZooKeeper ensemble via the `zookeeper` crate.

use crate::backend::{Backend, BackendError, NodeMode};
use observability_deps::tracing::warn;
use parking_lot::Mutex;
use std::time::Duration;
use zookeeper::{Acl, CreateMode, KeeperState, WatchedEvent, Watcher, ZkError, ZooKeeper};

fn to_backend_error(path: &str, err: ZkError) -> BackendError {
    match err {
        ZkError::NodeExists => BackendError::NodeExists(path.to_string()),
        ZkError::NoNode => BackendError::NoNode(path.to_string()),
        ZkError::NotEmpty => BackendError::HasChildren(path.to_string()),
        ZkError::InvalidACL | ZkError::BadArguments | ZkError::BadVersion => {
            BackendError::Invalid(format!("{path}: {err:?}"))
        }
        other => BackendError::Service(format!("{path}: {other:?}")),
    }
}

struct SessionWatcher {
    on_expired: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Watcher for SessionWatcher {
    fn handle(&self, event: WatchedEvent) {
        if event.keeper_state == KeeperState::Expired {
            warn!("zookeeper session expired");
            if let Some(callback) = self.on_expired.lock().take() {
                callback();
            }
        }
    }
}

/// A [`Backend`] backed by a live connection to a ZooKeeper ensemble.
pub struct ZooKeeperBackend {
    client: ZooKeeper,
    watcher: std::sync::Arc<SessionWatcher>,
}

impl std::fmt::Debug for ZooKeeperBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZooKeeperBackend").finish_non_exhaustive()
    }
}

impl ZooKeeperBackend {
    /// Connect to `connect_string` (e.g. `"zk1:2181,zk2:2181/logdex"`), with the given session
    /// timeout. Blocks the calling thread until the initial connection is established or the
    /// connect attempt fails.
    pub fn connect(connect_string: &str, session_timeout: Duration) -> Result<Self, BackendError> {
        let watcher = std::sync::Arc::new(SessionWatcher {
            on_expired: Mutex::new(None),
        });
        let watcher_for_connect = std::sync::Arc::clone(&watcher);
        let client = ZooKeeper::connect(connect_string, session_timeout, move |event| {
            watcher_for_connect.handle(event)
        })
        .map_err(|e| BackendError::Service(format!("connect failed: {e}")))?;
        Ok(Self { client, watcher })
    }
}

impl Backend for ZooKeeperBackend {
    fn create(
        &self,
        path: &str,
        data: Vec<u8>,
        create_parents: bool,
        mode: NodeMode,
    ) -> Result<(), BackendError> {
        let create_mode = match mode {
            NodeMode::Persistent => CreateMode::Persistent,
            NodeMode::Ephemeral => CreateMode::Ephemeral,
        };

        if create_parents {
            if mode == NodeMode::Ephemeral {
                return Err(BackendError::Invalid(
                    "ephemeral nodes cannot materialize missing parents".into(),
                ));
            }
            let mut cursor = String::new();
            for segment in path.split('/').filter(|s| !s.is_empty()) {
                cursor.push('/');
                cursor.push_str(segment);
                if cursor == path {
                    break;
                }
                match self
                    .client
                    .create(&cursor, Vec::new(), Acl::open_unsafe().clone(), CreateMode::Persistent)
                {
                    Ok(_) | Err(ZkError::NodeExists) => {}
                    Err(e) => return Err(to_backend_error(&cursor, e)),
                }
            }
        }

        self.client
            .create(path, data, Acl::open_unsafe().clone(), create_mode)
            .map(|_| ())
            .map_err(|e| to_backend_error(path, e))
    }

    fn put(&self, path: &str, data: Vec<u8>) -> Result<(), BackendError> {
        self.client
            .set_data(path, data, None)
            .map(|_| ())
            .map_err(|e| to_backend_error(path, e))
    }

    fn get(&self, path: &str) -> Result<Vec<u8>, BackendError> {
        self.client
            .get_data(path, false)
            .map(|(data, _stat)| data)
            .map_err(|e| to_backend_error(path, e))
    }

    fn exists(&self, path: &str) -> Result<bool, BackendError> {
        self.client
            .exists(path, false)
            .map(|stat| stat.is_some())
            .map_err(|e| to_backend_error(path, e))
    }

    fn delete(&self, path: &str) -> Result<(), BackendError> {
        self.client
            .delete(path, None)
            .map_err(|e| to_backend_error(path, e))
    }

    fn get_children(&self, path: &str) -> Result<Vec<String>, BackendError> {
        self.client
            .get_children(path, false)
            .map_err(|e| to_backend_error(path, e))
    }

    fn on_session_expired(&self, callback: Box<dyn FnOnce() + Send>) {
        *self.watcher.on_expired.lock() = Some(callback);
    }

    fn close(&self) {
        if let Err(e) = self.client.close() {
            warn!(error = %e, "error closing zookeeper session");
        }
    }
}
