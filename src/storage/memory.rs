//! In-memory storage engine using `DashMap`.
//!
//! This is the ephemeral backend - data is lost on process restart.
//! For persistence, use [`PersistentStorage`](super::PersistentStorage).

use super::{Keyspace, StorageEngine, StorageKind};
use crate::Result;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

type Page = Arc<RwLock<HashMap<String, Vec<u8>>>>;

/// In-memory storage engine.
///
/// The outer `DashMap` is sharded, so lookups of different keyspaces do not
/// contend; each keyspace then has its own `RwLock` which serializes writers
/// within that keyspace.
///
/// # Example
///
/// ```rust
/// use trueno_pipeline::storage::{Keyspace, MemoryStorage, StorageEngine};
///
/// # fn example() -> trueno_pipeline::Result<()> {
/// let storage = MemoryStorage::new();
/// let ks = Keyspace::new("hello");
/// storage.put(&ks, "key", b"world".to_vec())?;
/// assert_eq!(storage.get(&ks, "key")?, Some(b"world".to_vec()));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MemoryStorage {
    keyspaces: DashMap<Keyspace, Page>,
}

impl MemoryStorage {
    /// Create a new in-memory storage engine.
    #[must_use]
    pub fn new() -> Self {
        Self {
            keyspaces: DashMap::new(),
        }
    }

    /// Get the number of keyspaces in the engine.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keyspaces.len()
    }

    /// Check if the engine holds no keyspaces.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keyspaces.is_empty()
    }

    /// Drop every keyspace.
    pub fn clear(&self) {
        self.keyspaces.clear();
    }

    fn page(&self, keyspace: &Keyspace) -> Option<Page> {
        self.keyspaces.get(keyspace).map(|p| Arc::clone(p.value()))
    }

    fn page_or_create(&self, keyspace: &Keyspace) -> Page {
        Arc::clone(self.keyspaces.entry(keyspace.clone()).or_default().value())
    }
}

impl StorageEngine for MemoryStorage {
    fn get(&self, keyspace: &Keyspace, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .page(keyspace)
            .and_then(|page| page.read().get(key).cloned()))
    }

    fn put(&self, keyspace: &Keyspace, key: &str, value: Vec<u8>) -> Result<()> {
        self.page_or_create(keyspace)
            .write()
            .insert(key.to_string(), value);
        Ok(())
    }

    fn put_many(&self, keyspace: &Keyspace, entries: Vec<(String, Vec<u8>)>) -> Result<()> {
        let page = self.page_or_create(keyspace);
        let mut guard = page.write();
        guard.extend(entries);
        Ok(())
    }

    fn remove(&self, keyspace: &Keyspace, key: &str) -> Result<()> {
        if let Some(page) = self.page(keyspace) {
            page.write().remove(key);
        }
        Ok(())
    }

    fn drop_keyspace(&self, keyspace: &Keyspace) -> Result<()> {
        if let Some((_, page)) = self.keyspaces.remove(keyspace) {
            // Wait for in-flight writers on this keyspace before discarding
            page.write().clear();
        }
        Ok(())
    }

    fn contains_keyspace(&self, keyspace: &Keyspace) -> Result<bool> {
        Ok(self
            .page(keyspace)
            .is_some_and(|page| !page.read().is_empty()))
    }

    fn list_keyspaces(&self) -> Result<Vec<Keyspace>> {
        let mut names: Vec<Keyspace> = self
            .keyspaces
            .iter()
            .filter(|entry| !entry.value().read().is_empty())
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        Ok(names)
    }

    fn close_keyspace(&self, _keyspace: &Keyspace) -> Result<()> {
        // Nothing cached beyond the data itself
        Ok(())
    }

    fn kind(&self) -> StorageKind {
        StorageKind::InMemory
    }
}
