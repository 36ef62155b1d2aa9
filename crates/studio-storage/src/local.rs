//! Synchronous string key-value store for session and guest markers.
//!
//! Reads and writes never fail from the caller's point of view: a file that
//! cannot be read starts empty and a failed flush is logged.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tracing::{debug, warn};

/// A small synchronous string store.
pub trait LocalStore: Send + Sync {
    fn get_item(&self, key: &str) -> Option<String>;

    fn set_item(&self, key: &str, value: &str);

    fn remove_item(&self, key: &str);

    /// Every key starting with `prefix`.
    fn keys_with_prefix(&self, prefix: &str) -> Vec<String>;

    fn clear(&self);
}

fn matching_keys(items: &BTreeMap<String, String>, prefix: &str) -> Vec<String> {
    items
        .range(prefix.to_string()..)
        .map(|(k, _)| k)
        .take_while(|k| k.starts_with(prefix))
        .cloned()
        .collect()
}

/// Process-lifetime store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStore for MemoryStore {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.read().get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) {
        self.items.write().insert(key.to_string(), value.to_string());
    }

    fn remove_item(&self, key: &str) {
        self.items.write().remove(key);
    }

    fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        matching_keys(&self.items.read(), prefix)
    }

    fn clear(&self) {
        self.items.write().clear();
    }
}

/// Store persisted as a JSON object in a single file.
///
/// The whole map is rewritten on every change through a temporary file and a
/// rename, so a crash leaves either the old or the new contents.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    items: RwLock<BTreeMap<String, String>>,
}

impl FileStore {
    /// Load the store at `path`, starting empty if it is missing or unreadable.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let items = match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                warn!("Local state file {:?} is corrupt, starting empty: {}", path, e);
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!("Failed to read local state file {:?}: {}", path, e);
                BTreeMap::new()
            }
        };

        debug!("Loaded {} local state entries from {:?}", items.len(), path);
        Self {
            path,
            items: RwLock::new(items),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, items: &BTreeMap<String, String>) {
        if let Err(e) = write_atomic(&self.path, items) {
            warn!("Failed to write local state file {:?}: {}", self.path, e);
        }
    }
}

fn write_atomic(path: &Path, items: &BTreeMap<String, String>) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let text = serde_json::to_string_pretty(items)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, text)?;
    std::fs::rename(&tmp, path)
}

impl LocalStore for FileStore {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.read().get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) {
        let mut items = self.items.write();
        items.insert(key.to_string(), value.to_string());
        self.flush(&items);
    }

    fn remove_item(&self, key: &str) {
        let mut items = self.items.write();
        if items.remove(key).is_some() {
            self.flush(&items);
        }
    }

    fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        matching_keys(&self.items.read(), prefix)
    }

    fn clear(&self) {
        let mut items = self.items.write();
        items.clear();
        self.flush(&items);
    }
}
