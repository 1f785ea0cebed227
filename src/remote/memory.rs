//! In-memory remote tree for exercising the client without a server

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use secrecy::ExposeSecret;

use crate::config::ConnectionSettings;
use crate::error::IllDataError;
use crate::remote_path;
use crate::types::FileEntry;

use super::{Connector, RemoteFs};

#[derive(Debug, Clone)]
enum Node {
    Dir,
    File(Vec<u8>),
    Link(String),
}

#[derive(Debug, Default)]
struct Tree {
    nodes: BTreeMap<String, Node>,
    read_links: HashMap<String, usize>,
}

/// Fake server. Clones share the same tree and counters.
#[derive(Debug, Clone)]
pub(crate) struct MemoryConnector {
    login_dir: String,
    password: String,
    tree: Arc<Mutex<Tree>>,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
    fail_close: bool,
}

impl MemoryConnector {
    pub(crate) fn new(login_dir: &str, password: &str) -> Self {
        let connector = Self {
            login_dir: login_dir.to_string(),
            password: password.to_string(),
            tree: Arc::new(Mutex::new(Tree::default())),
            opened: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicUsize::new(0)),
            fail_close: false,
        };
        connector.add_dir("/");
        connector.add_dir(login_dir);
        connector
    }

    /// Sessions report an error from `close`
    pub(crate) fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    /// Create `path` and its missing ancestors
    pub(crate) fn add_dir(&self, path: &str) {
        let mut tree = self.tree.lock().unwrap();
        let mut current = String::from("/");
        tree.nodes.insert(current.clone(), Node::Dir);
        for component in path.split('/').filter(|c| !c.is_empty()) {
            current = remote_path::join(&current, component);
            tree.nodes.entry(current.clone()).or_insert(Node::Dir);
        }
    }

    pub(crate) fn add_file(&self, path: &str, content: &[u8]) {
        self.add_dir(&parent(path));
        self.insert(path, Node::File(content.to_vec()));
    }

    pub(crate) fn add_link(&self, path: &str, target: &str) {
        self.add_dir(&parent(path));
        self.insert(path, Node::Link(target.to_string()));
    }

    pub(crate) fn remove(&self, path: &str) {
        self.tree.lock().unwrap().nodes.remove(path);
    }

    pub(crate) fn file(&self, path: &str) -> Option<Vec<u8>> {
        match self.tree.lock().unwrap().nodes.get(path) {
            Some(Node::File(content)) => Some(content.clone()),
            _ => None,
        }
    }

    /// How many times the link at `path` (as passed by the client) was read
    pub(crate) fn read_link_count(&self, path: &str) -> usize {
        self.tree
            .lock()
            .unwrap()
            .read_links
            .get(path)
            .copied()
            .unwrap_or(0)
    }

    pub(crate) fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub(crate) fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    fn insert(&self, path: &str, node: Node) {
        self.tree.lock().unwrap().nodes.insert(path.to_string(), node);
    }
}

impl Connector for MemoryConnector {
    type Fs = MemoryFs;

    async fn connect(&self, settings: &ConnectionSettings) -> Result<MemoryFs, IllDataError> {
        if settings.password.expose_secret() != self.password {
            return Err(IllDataError::connection("Authentication rejected by server"));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryFs {
            login_dir: self.login_dir.clone(),
            tree: self.tree.clone(),
            closed: self.closed.clone(),
            fail_close: self.fail_close,
        })
    }
}

/// One session on the in-memory tree
#[derive(Debug)]
pub(crate) struct MemoryFs {
    login_dir: String,
    tree: Arc<Mutex<Tree>>,
    closed: Arc<AtomicUsize>,
    fail_close: bool,
}

impl MemoryFs {
    /// Absolute, lexically normalised form of `path`
    fn absolute(&self, path: &str) -> String {
        let joined = if path.starts_with('/') {
            path.to_string()
        } else {
            remote_path::join(&self.login_dir, path)
        };

        let mut parts: Vec<&str> = Vec::new();
        for component in joined.split('/') {
            match component {
                "" | "." => {}
                ".." => {
                    parts.pop();
                }
                other => parts.push(other),
            }
        }
        format!("/{}", parts.join("/"))
    }

    fn node(&self, path: &str) -> Option<Node> {
        self.tree.lock().unwrap().nodes.get(path).cloned()
    }

    fn children(&self, dir: &str) -> Result<Vec<(String, Node)>, IllDataError> {
        let dir = self.absolute(dir);
        match self.node(&dir) {
            Some(Node::Dir) => {}
            _ => {
                return Err(IllDataError::RemoteOperation(format!(
                    "Failed to read directory {}: No such file",
                    dir
                )));
            }
        }

        let tree = self.tree.lock().unwrap();
        Ok(tree
            .nodes
            .iter()
            .filter(|(path, _)| path.as_str() != "/" && parent(path) == dir)
            .map(|(path, node)| (name(path).to_string(), node.clone()))
            // servers make no ordering promise
            .rev()
            .collect())
    }
}

impl RemoteFs for MemoryFs {
    async fn read_link(&self, path: &str) -> Result<String, IllDataError> {
        let absolute = self.absolute(path);
        *self
            .tree
            .lock()
            .unwrap()
            .read_links
            .entry(path.to_string())
            .or_default() += 1;

        match self.node(&absolute) {
            Some(Node::Link(target)) => Ok(target),
            _ => Err(IllDataError::RemoteOperation(format!(
                "Failed to read link {}: No such file",
                absolute
            ))),
        }
    }

    async fn canonicalize(&self, path: &str) -> Result<String, IllDataError> {
        let absolute = self.absolute(path);
        match self.node(&absolute) {
            Some(Node::Link(target)) => {
                let link_dir = parent(&absolute);
                Ok(self.absolute(&remote_path::resolve_link_target(&link_dir, &target)))
            }
            Some(_) => Ok(absolute),
            None => Err(IllDataError::RemoteOperation(format!(
                "Failed to canonicalize {}: No such file",
                absolute
            ))),
        }
    }

    async fn list_names(&self, path: &str) -> Result<Vec<String>, IllDataError> {
        Ok(self.children(path)?.into_iter().map(|(name, _)| name).collect())
    }

    async fn list_entries(&self, path: &str) -> Result<Vec<FileEntry>, IllDataError> {
        Ok(self
            .children(path)?
            .into_iter()
            .map(|(name, node)| match node {
                Node::Dir => FileEntry::from_stat(name, 4096, Some(0), 0o040755),
                Node::File(content) => {
                    FileEntry::from_stat(name, content.len() as u64, Some(0), 0o100644)
                }
                Node::Link(target) => {
                    FileEntry::from_stat(name, target.len() as u64, Some(0), 0o120777)
                }
            })
            .collect())
    }

    async fn download(&self, remote_path: &str, local_path: &Path) -> Result<u64, IllDataError> {
        let absolute = self.absolute(remote_path);
        let Some(Node::File(content)) = self.node(&absolute) else {
            return Err(IllDataError::RemoteOperation(format!(
                "Failed to open remote file {}: No such file",
                absolute
            )));
        };

        tokio::fs::write(local_path, &content).await.map_err(|e| {
            IllDataError::LocalIo(format!(
                "Failed to write local file {}: {}",
                local_path.display(),
                e
            ))
        })?;
        Ok(content.len() as u64)
    }

    async fn upload(&self, local_path: &Path, remote_path: &str) -> Result<u64, IllDataError> {
        let is_file = tokio::fs::metadata(local_path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !is_file {
            return Err(IllDataError::LocalIo(format!(
                "Failed to read local file {}: not a regular file",
                local_path.display()
            )));
        }

        let content = tokio::fs::read(local_path).await.map_err(|e| {
            IllDataError::LocalIo(format!(
                "Failed to read local file {}: {}",
                local_path.display(),
                e
            ))
        })?;

        let absolute = self.absolute(remote_path);
        if !matches!(self.node(&parent(&absolute)), Some(Node::Dir)) {
            return Err(IllDataError::RemoteOperation(format!(
                "Failed to open remote file {}: No such file",
                absolute
            )));
        }

        let len = content.len() as u64;
        self.tree
            .lock()
            .unwrap()
            .nodes
            .insert(absolute, Node::File(content));
        Ok(len)
    }

    async fn close(self) -> Result<(), IllDataError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(IllDataError::RemoteOperation(
                "Connection reset while closing".to_string(),
            ));
        }
        Ok(())
    }
}

fn parent(path: &str) -> String {
    match path.trim_end_matches('/').rsplit_once('/') {
        Some(("", _)) | None => "/".to_string(),
        Some((parent, _)) => parent.to_string(),
    }
}

fn name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
