//! Durable on-device key-value storage
//!
//! Values are JSON blobs under fixed string keys. Every read and write
//! goes through [`load_json`] / [`save_json`], which log failures and fall
//! back to defaults instead of propagating them: blocked or full storage
//! degrades the widget, it never breaks it.

use crate::{Error, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// Storage keys
pub mod keys {
    /// Viewed story indices
    pub const SEEN: &str = "igStoriesSeen";
    /// Visitor profile `{name, whats}`
    pub const PROFILE: &str = "igStoriesProfile";
    /// Like count per story key
    pub const LIKES: &str = "igStoriesLikes";
    /// Liked flag per visitor and story key
    pub const LIKED: &str = "igStoriesLiked";
    /// Comment list per story key
    pub const COMMENTS: &str = "igStoriesComments";
    /// One-time seeding flag
    pub const SEEDED: &str = "igStoriesSeeded";
}

/// String-keyed storage backend
pub trait KeyValueStore {
    fn get_item(&self, key: &str) -> Result<Option<String>>;
    fn set_item(&self, key: &str, value: &str) -> Result<()>;
    fn remove_item(&self, key: &str) -> Result<()>;
}

/// Read and decode a JSON value, `None` on absence or any failure
pub fn load_json<S, T>(store: &S, key: &str) -> Option<T>
where
    S: KeyValueStore + ?Sized,
    T: DeserializeOwned,
{
    let raw = match store.get_item(key) {
        Ok(raw) => raw?,
        Err(e) => {
            warn!(key, error = %e, "Storage read failed");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key, error = %e, "Discarding malformed stored value");
            None
        }
    }
}

/// Encode and write a JSON value; returns whether it was persisted
pub fn save_json<S, T>(store: &S, key: &str, value: &T) -> bool
where
    S: KeyValueStore + ?Sized,
    T: Serialize + ?Sized,
{
    let result = serde_json::to_string(value)
        .map_err(Error::from)
        .and_then(|raw| store.set_item(key, &raw));
    match result {
        Ok(()) => true,
        Err(e) => {
            warn!(key, error = %e, "Storage write failed");
            false
        }
    }
}

/// Shared in-memory store
///
/// Clones share the same map, which lets tests hand the "same device
/// storage" to several engine instances.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    items: Arc<RwLock<HashMap<String, String>>>,
    unavailable: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that rejects every call, like blocked browser storage
    pub fn unavailable() -> Self {
        Self {
            items: Arc::default(),
            unavailable: true,
        }
    }

    fn check(&self) -> Result<()> {
        if self.unavailable {
            Err(Error::storage("storage is blocked"))
        } else {
            Ok(())
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        self.check()?;
        let items = self.items.read().map_err(|_| Error::storage("lock poisoned"))?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.check()?;
        let mut items = self.items.write().map_err(|_| Error::storage("lock poisoned"))?;
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.check()?;
        let mut items = self.items.write().map_err(|_| Error::storage("lock poisoned"))?;
        items.remove(key);
        Ok(())
    }
}

/// Store persisted as one JSON object on disk
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    items: Arc<RwLock<HashMap<String, String>>>,
}

impl FileStore {
    /// Open (or lazily create) the store at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let items = match std::fs::read_to_string(&path) {
            Ok(text) if !text.trim().is_empty() => serde_json::from_str(&text)?,
            Ok(_) => HashMap::new(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), "File store opened");
        Ok(Self {
            path,
            items: Arc::new(RwLock::new(items)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write through a temp file in the same directory, then rename over
    /// the store so readers never see a truncated document
    fn flush(&self, items: &HashMap<String, String>) -> Result<()> {
        let dir = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => {
                std::fs::create_dir_all(parent)?;
                parent
            }
            None => Path::new("."),
        };
        let mut temp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut temp, items)?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let items = self.items.read().map_err(|_| Error::storage("lock poisoned"))?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut items = self.items.write().map_err(|_| Error::storage("lock poisoned"))?;
        items.insert(key.to_string(), value.to_string());
        self.flush(&items)
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let mut items = self.items.write().map_err(|_| Error::storage("lock poisoned"))?;
        items.remove(key);
        self.flush(&items)
    }
}

/// Set of viewed story indices, persisted under [`keys::SEEN`]
///
/// Only ever grows: marking merges with whatever the device already
/// recorded, so concurrent widgets on the same storage never lose marks.
#[derive(Debug, Clone)]
pub struct SeenSet<S> {
    store: S,
    indices: BTreeSet<usize>,
}

impl<S: KeyValueStore> SeenSet<S> {
    /// Load the stored record; empty when storage is unavailable
    pub fn load(store: S) -> Self {
        let indices = load_json::<_, Vec<usize>>(&store, keys::SEEN)
            .map(|v| v.into_iter().collect())
            .unwrap_or_default();
        Self { store, indices }
    }

    pub fn contains(&self, index: usize) -> bool {
        self.indices.contains(&index)
    }

    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.indices.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Mark a story as seen; returns true when it was not seen before
    pub fn mark(&mut self, index: usize) -> bool {
        if let Some(stored) = load_json::<_, Vec<usize>>(&self.store, keys::SEEN) {
            self.indices.extend(stored);
        }
        let inserted = self.indices.insert(index);
        if inserted {
            let list: Vec<usize> = self.indices.iter().copied().collect();
            save_json(&self.store, keys::SEEN, &list);
        }
        inserted
    }

    /// Forget every mark, including the persisted record
    pub fn clear(&mut self) {
        self.indices.clear();
        if let Err(e) = self.store.remove_item(keys::SEEN) {
            warn!(error = %e, "Failed to clear seen stories");
        }
    }
}
