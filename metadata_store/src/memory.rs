//! An in-process coordination service used by tests (and by [`crate::MetadataStore::embedded`])
//! that implements the same hierarchical, session-scoped semantics a real ZooKeeper ensemble
//! would provide.

use crate::backend::{Backend, BackendError, NodeMode};
use parking_lot::Mutex;
use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
};

#[derive(Debug)]
struct Node {
    data: Vec<u8>,
    mode: NodeMode,
    owner_session: Option<u64>,
}

#[derive(Debug)]
struct Shared {
    nodes: Mutex<BTreeMap<String, Node>>,
    next_session: AtomicU64,
    alive: AtomicBool,
}

impl Shared {
    fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            "/".to_string(),
            Node {
                data: Vec::new(),
                mode: NodeMode::Persistent,
                owner_session: None,
            },
        );
        Self {
            nodes: Mutex::new(nodes),
            next_session: AtomicU64::new(1),
            alive: AtomicBool::new(true),
        }
    }

    fn destroy_ephemeral_for_session(&self, session_id: u64) {
        let mut nodes = self.nodes.lock();
        nodes.retain(|_, node| node.owner_session != Some(session_id));
    }
}

/// A shared, in-process stand-in for a ZooKeeper ensemble. Multiple [`InMemoryBackend`] "client
/// sessions" can [`InMemoryCluster::connect`] to the same cluster, which is what lets tests
/// exercise cross-session ephemeral-node behavior (§8 scenario 5).
#[derive(Debug, Clone)]
pub struct InMemoryCluster {
    shared: Arc<Shared>,
}

impl Default for InMemoryCluster {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCluster {
    /// Start a fresh, empty cluster.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared::new()),
        }
    }

    /// Open a new client session against this cluster.
    pub fn connect(&self) -> InMemoryBackend {
        let session_id = self.shared.next_session.fetch_add(1, Ordering::Relaxed);
        InMemoryBackend {
            shared: Arc::clone(&self.shared),
            session_id,
            expired_callback: Mutex::new(None),
        }
    }

    /// Simulate the coordination service going unreachable: every subsequent operation on any
    /// connected session fails with [`BackendError::Service`] (§8 scenario 6).
    pub fn stop(&self) {
        self.shared.alive.store(false, Ordering::Relaxed);
    }

    /// Bring a stopped cluster back up.
    pub fn resume(&self) {
        self.shared.alive.store(true, Ordering::Relaxed);
    }
}

/// A single client session against an [`InMemoryCluster`].
#[derive(Debug)]
pub struct InMemoryBackend {
    shared: Arc<Shared>,
    session_id: u64,
    expired_callback: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl InMemoryBackend {
    /// Simulate this session's connection to the coordination service expiring involuntarily:
    /// its ephemeral nodes are destroyed and the registered fatal callback fires.
    pub fn expire_session(&self) {
        self.shared.destroy_ephemeral_for_session(self.session_id);
        if let Some(callback) = self.expired_callback.lock().take() {
            callback();
        }
    }

    fn check_alive(&self) -> Result<(), BackendError> {
        if self.shared.alive.load(Ordering::Relaxed) {
            Ok(())
        } else {
            Err(BackendError::Service("coordination service unreachable".into()))
        }
    }

    fn parent_of(path: &str) -> Result<String, BackendError> {
        if path == "/" {
            return Err(BackendError::Invalid("root has no parent".into()));
        }
        match path.rfind('/') {
            Some(0) => Ok("/".to_string()),
            Some(idx) => Ok(path[..idx].to_string()),
            None => Err(BackendError::Invalid(format!("path must be absolute: {path}"))),
        }
    }

    fn validate_path(path: &str) -> Result<(), BackendError> {
        if !path.starts_with('/') || (path.len() > 1 && path.ends_with('/')) {
            return Err(BackendError::Invalid(format!("not an absolute path: {path}")));
        }
        Ok(())
    }
}

impl Backend for InMemoryBackend {
    fn create(
        &self,
        path: &str,
        data: Vec<u8>,
        create_parents: bool,
        mode: NodeMode,
    ) -> Result<(), BackendError> {
        self.check_alive()?;
        Self::validate_path(path)?;

        let mut nodes = self.shared.nodes.lock();
        if nodes.contains_key(path) {
            return Err(BackendError::NodeExists(path.to_string()));
        }

        let parent = Self::parent_of(path)?;
        if !nodes.contains_key(&parent) {
            if !create_parents {
                return Err(BackendError::NoNode(parent));
            }
            if mode == NodeMode::Ephemeral {
                return Err(BackendError::Invalid(
                    "ephemeral nodes cannot materialize missing parents".into(),
                ));
            }
            let mut cursor = String::new();
            for segment in parent.split('/').filter(|s| !s.is_empty()) {
                cursor.push('/');
                cursor.push_str(segment);
                nodes.entry(cursor.clone()).or_insert_with(|| Node {
                    data: Vec::new(),
                    mode: NodeMode::Persistent,
                    owner_session: None,
                });
            }
        } else if nodes.get(&parent).unwrap().mode == NodeMode::Ephemeral {
            return Err(BackendError::Invalid(format!(
                "cannot create {path}: parent {parent} is ephemeral"
            )));
        }

        nodes.insert(
            path.to_string(),
            Node {
                data,
                mode,
                owner_session: matches!(mode, NodeMode::Ephemeral).then_some(self.session_id),
            },
        );
        Ok(())
    }

    fn put(&self, path: &str, data: Vec<u8>) -> Result<(), BackendError> {
        self.check_alive()?;
        let mut nodes = self.shared.nodes.lock();
        let node = nodes
            .get_mut(path)
            .ok_or_else(|| BackendError::NoNode(path.to_string()))?;
        node.data = data;
        Ok(())
    }

    fn get(&self, path: &str) -> Result<Vec<u8>, BackendError> {
        self.check_alive()?;
        let nodes = self.shared.nodes.lock();
        nodes
            .get(path)
            .map(|n| n.data.clone())
            .ok_or_else(|| BackendError::NoNode(path.to_string()))
    }

    fn exists(&self, path: &str) -> Result<bool, BackendError> {
        self.check_alive()?;
        Ok(self.shared.nodes.lock().contains_key(path))
    }

    fn delete(&self, path: &str) -> Result<(), BackendError> {
        self.check_alive()?;
        let mut nodes = self.shared.nodes.lock();
        if !nodes.contains_key(path) {
            return Err(BackendError::NoNode(path.to_string()));
        }
        let prefix = if path == "/" {
            "/".to_string()
        } else {
            format!("{path}/")
        };
        let has_children = nodes.keys().any(|k| k != path && k.starts_with(&prefix));
        if has_children {
            return Err(BackendError::HasChildren(path.to_string()));
        }
        nodes.remove(path);
        Ok(())
    }

    fn get_children(&self, path: &str) -> Result<Vec<String>, BackendError> {
        self.check_alive()?;
        let nodes = self.shared.nodes.lock();
        if !nodes.contains_key(path) {
            return Err(BackendError::NoNode(path.to_string()));
        }
        let prefix = if path == "/" {
            "/".to_string()
        } else {
            format!("{path}/")
        };
        let mut children: Vec<String> = nodes
            .keys()
            .filter_map(|k| {
                if k == path || !k.starts_with(&prefix) {
                    return None;
                }
                let rest = &k[prefix.len()..];
                if rest.contains('/') {
                    None
                } else {
                    Some(rest.to_string())
                }
            })
            .collect();
        children.sort();
        Ok(children)
    }

    fn on_session_expired(&self, callback: Box<dyn FnOnce() + Send>) {
        *self.expired_callback.lock() = Some(callback);
    }

    fn close(&self) {
        self.shared.destroy_ephemeral_for_session(self.session_id);
    }
}
