//! Disk-backed storage engine.
//!
//! Each keyspace maps to one page file `<root>/<keyspace>.tps`:
//!
//! ```text
//! +-------+-------+---------------------------------------------+
//! | TPS1  | codec | codec(bincode(BTreeMap<String, Vec<u8>>))   |
//! +-------+-------+---------------------------------------------+
//!  4 bytes 1 byte
//! ```
//!
//! Pages are loaded lazily on first access and cached; lookups of keyspaces
//! with no page file are not cached. Writes go through to disk immediately
//! (temp file + rename) and the cached page is replaced only after the write
//! succeeds, so a crash never leaves a torn page and re-opening the same root
//! after a restart recovers every keyspace.

use super::{Keyspace, PageCodec, StorageEngine, StorageKind};
use crate::{Error, Result};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Page file magic bytes
const PAGE_MAGIC: &[u8; 4] = b"TPS1";

/// Page file extension
const PAGE_EXTENSION: &str = "tps";

type Entries = BTreeMap<String, Vec<u8>>;

/// Cached page slot. `None` until first access loads it from disk.
#[derive(Debug, Default)]
struct Slot {
    entries: Option<Entries>,
}

/// Persistent storage engine rooted at a directory.
///
/// # Example
///
/// ```rust,no_run
/// use trueno_pipeline::storage::{Keyspace, PageCodec, PersistentStorage, StorageEngine};
///
/// # fn example() -> trueno_pipeline::Result<()> {
/// let storage = PersistentStorage::open("/var/lib/models", PageCodec::None)?;
/// storage.put(&Keyspace::new("diabetes.k_means"), "state", vec![1, 2, 3])?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct PersistentStorage {
    root: PathBuf,
    codec: PageCodec,
    pages: DashMap<Keyspace, Arc<Mutex<Slot>>>,
}

impl PersistentStorage {
    /// Open (or create) a storage root directory.
    ///
    /// # Errors
    /// Returns error if the directory cannot be created
    pub fn open(root: impl AsRef<Path>, codec: PageCodec) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        debug!(root = %root.display(), codec = codec.as_str(), "opened persistent storage");
        Ok(Self {
            root,
            codec,
            pages: DashMap::new(),
        })
    }

    /// Root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Codec used for pages written by this engine.
    #[must_use]
    pub const fn codec(&self) -> PageCodec {
        self.codec
    }

    /// Number of keyspaces whose page is currently cached.
    #[must_use]
    pub fn cached_keyspaces(&self) -> usize {
        self.pages.len()
    }

    fn page_path(&self, keyspace: &Keyspace) -> PathBuf {
        self.root
            .join(format!("{}.{PAGE_EXTENSION}", keyspace.as_str()))
    }

    fn slot(&self, keyspace: &Keyspace) -> Arc<Mutex<Slot>> {
        // Clone the Arc so the shard guard is released before any IO
        Arc::clone(self.pages.entry(keyspace.clone()).or_default().value())
    }

    fn read_page(&self, keyspace: &Keyspace) -> Result<Entries> {
        let path = self.page_path(keyspace);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Entries::new()),
            Err(e) => return Err(e.into()),
        };

        if bytes.len() < PAGE_MAGIC.len() + 1 || &bytes[..PAGE_MAGIC.len()] != PAGE_MAGIC {
            return Err(Error::StorageError(format!(
                "corrupt page for keyspace {keyspace}: bad header"
            )));
        }
        let codec = PageCodec::from_tag(bytes[PAGE_MAGIC.len()])?;
        let payload = codec.decode(&bytes[PAGE_MAGIC.len() + 1..])?;
        let entries: Entries = bincode::deserialize(&payload)?;

        debug!(keyspace = %keyspace, keys = entries.len(), "loaded page");
        Ok(entries)
    }

    fn write_page(&self, keyspace: &Keyspace, entries: &Entries) -> Result<()> {
        let path = self.page_path(keyspace);
        if entries.is_empty() {
            return remove_file_if_exists(&path);
        }

        let payload = bincode::serialize(entries)?;
        let mut bytes = Vec::with_capacity(payload.len() + PAGE_MAGIC.len() + 1);
        bytes.extend_from_slice(PAGE_MAGIC);
        bytes.push(self.codec.tag());
        bytes.extend_from_slice(&self.codec.encode(&payload)?);

        let tmp = self
            .root
            .join(format!(".{}.{PAGE_EXTENSION}.tmp", keyspace.as_str()));
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, &path)?;

        debug!(keyspace = %keyspace, keys = entries.len(), bytes = bytes.len(), "flushed page");
        Ok(())
    }

    /// Run `f` against the keyspace's loaded entries while holding its lock.
    ///
    /// A keyspace with neither a cached slot nor a page file reads as empty
    /// without being cached.
    fn read_entries<T>(&self, keyspace: &Keyspace, f: impl FnOnce(&Entries) -> T) -> Result<T> {
        if !self.pages.contains_key(keyspace) && !self.page_path(keyspace).is_file() {
            return Ok(f(&Entries::new()));
        }
        let slot = self.slot(keyspace);
        let mut guard = slot.lock();
        if guard.entries.is_none() {
            guard.entries = Some(self.read_page(keyspace)?);
        }
        match guard.entries.as_ref() {
            Some(entries) => Ok(f(entries)),
            None => Err(Error::StorageError(format!(
                "page for keyspace {keyspace} failed to load"
            ))),
        }
    }

    /// Apply `f` to a copy of the keyspace's entries and flush it. The cache
    /// only takes the new page once it is on disk. `f` returns `false` when
    /// nothing changed.
    fn update(&self, keyspace: &Keyspace, f: impl FnOnce(&mut Entries) -> bool) -> Result<()> {
        let slot = self.slot(keyspace);
        let mut guard = slot.lock();
        let mut next = match guard.entries.as_ref() {
            Some(entries) => entries.clone(),
            None => self.read_page(keyspace)?,
        };
        if f(&mut next) {
            self.write_page(keyspace, &next)?;
        }
        guard.entries = Some(next);
        Ok(())
    }
}

fn remove_file_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

impl StorageEngine for PersistentStorage {
    fn get(&self, keyspace: &Keyspace, key: &str) -> Result<Option<Vec<u8>>> {
        self.read_entries(keyspace, |entries| entries.get(key).cloned())
    }

    fn put(&self, keyspace: &Keyspace, key: &str, value: Vec<u8>) -> Result<()> {
        self.update(keyspace, |entries| {
            entries.insert(key.to_string(), value);
            true
        })
    }

    fn put_many(&self, keyspace: &Keyspace, batch: Vec<(String, Vec<u8>)>) -> Result<()> {
        self.update(keyspace, |entries| {
            entries.extend(batch);
            true
        })
    }

    fn remove(&self, keyspace: &Keyspace, key: &str) -> Result<()> {
        if !self.read_entries(keyspace, |entries| entries.contains_key(key))? {
            return Ok(());
        }
        self.update(keyspace, |entries| entries.remove(key).is_some())
    }

    fn drop_keyspace(&self, keyspace: &Keyspace) -> Result<()> {
        let slot = self.slot(keyspace);
        {
            let mut guard = slot.lock();
            remove_file_if_exists(&self.page_path(keyspace))?;
            guard.entries = None;
        }
        self.pages.remove(keyspace);
        debug!(keyspace = %keyspace, "dropped keyspace");
        Ok(())
    }

    fn contains_keyspace(&self, keyspace: &Keyspace) -> Result<bool> {
        if let Some(slot) = self.pages.get(keyspace).map(|s| Arc::clone(s.value())) {
            if let Some(entries) = slot.lock().entries.as_ref() {
                return Ok(!entries.is_empty());
            }
        }
        Ok(self.page_path(keyspace).is_file())
    }

    fn list_keyspaces(&self) -> Result<Vec<Keyspace>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(PAGE_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if !stem.starts_with('.') {
                    names.push(Keyspace::from_escaped(stem.to_string()));
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn close_keyspace(&self, keyspace: &Keyspace) -> Result<()> {
        // Write-through: nothing left to flush, only evict the cached page
        if let Some((_, slot)) = self.pages.remove(keyspace) {
            slot.lock().entries = None;
            debug!(keyspace = %keyspace, "evicted page");
        }
        Ok(())
    }

    fn kind(&self) -> StorageKind {
        StorageKind::Persistent
    }
}
