//! Storage Engine: keyspace-scoped key-value persistence
//!
//! Provides the only object shared between stage instances:
//! - In-memory backend ([`MemoryStorage`]) - lost on process restart
//! - Persistent backend ([`PersistentStorage`]) - one lazily loaded page per keyspace
//!
//! Every operation on a keyspace is serialized by that keyspace's lock, so two
//! stages sharing a keyspace never observe a torn write. Operations on
//! different keyspaces never contend.
//!
//! # Example
//!
//! ```rust
//! use trueno_pipeline::storage::{Keyspace, MemoryStorage, StorageEngine};
//!
//! # fn example() -> trueno_pipeline::Result<()> {
//! let storage = MemoryStorage::new();
//! let keyspace = Keyspace::new("diabetes.min_max_scaler");
//!
//! storage.put(&keyspace, "state", b"params".to_vec())?;
//! assert_eq!(storage.get(&keyspace, "state")?, Some(b"params".to_vec()));
//!
//! storage.drop_keyspace(&keyspace)?;
//! assert!(!storage.contains_keyspace(&keyspace)?);
//! # Ok(())
//! # }
//! ```

mod codec;
mod memory;
mod persistent;

pub use codec::PageCodec;
pub use memory::MemoryStorage;
pub use persistent::PersistentStorage;

use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of an isolated region of the storage engine.
///
/// Keyspace names are restricted to `[A-Za-z0-9_.-]`: every other byte is
/// hex-escaped (`%XX`) so a keyspace is always a valid file stem.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Keyspace(String);

impl Keyspace {
    /// Create a keyspace, escaping characters outside `[A-Za-z0-9_.-]`.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self(escape(name))
    }

    /// Keyspace name as stored.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Rebuild a keyspace from an already-escaped name (e.g. a page file stem).
    pub(crate) const fn from_escaped(name: String) -> Self {
        Self(name)
    }
}

impl fmt::Display for Keyspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Escape every byte outside `[A-Za-z0-9_.-]` as `%XX`.
pub(crate) fn escape(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for byte in name.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'-' | b'.') {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

/// Which storage engine implementation backs a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageKind {
    /// Process-local maps, nothing survives a restart
    InMemory,
    /// Disk-backed pages under a root directory
    Persistent,
}

impl StorageKind {
    /// Get kind name as string
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InMemory => "in-memory",
            Self::Persistent => "persistent",
        }
    }
}

/// Keyspace-scoped key-value storage shared by all stages of a context.
///
/// Implementations must serialize operations per keyspace and must not block
/// operations on other keyspaces.
pub trait StorageEngine: Send + Sync + fmt::Debug {
    /// Get a value by key.
    ///
    /// Returns `None` if the key or the keyspace doesn't exist.
    ///
    /// # Errors
    /// Returns error if the backing page cannot be read or decoded
    fn get(&self, keyspace: &Keyspace, key: &str) -> Result<Option<Vec<u8>>>;

    /// Set a value for a key, creating the keyspace if needed.
    ///
    /// Overwrites any existing value.
    ///
    /// # Errors
    /// Returns error if the backing page cannot be written
    fn put(&self, keyspace: &Keyspace, key: &str, value: Vec<u8>) -> Result<()>;

    /// Set multiple key-value pairs in one keyspace.
    ///
    /// Backends that flush on write override this to flush once.
    ///
    /// # Errors
    /// Returns error if the backing page cannot be written
    fn put_many(&self, keyspace: &Keyspace, entries: Vec<(String, Vec<u8>)>) -> Result<()> {
        for (key, value) in entries {
            self.put(keyspace, &key, value)?;
        }
        Ok(())
    }

    /// Delete a key.
    ///
    /// No-op if the key doesn't exist.
    ///
    /// # Errors
    /// Returns error if the backing page cannot be written
    fn remove(&self, keyspace: &Keyspace, key: &str) -> Result<()>;

    /// Delete a keyspace and everything in it.
    ///
    /// No-op if the keyspace doesn't exist.
    ///
    /// # Errors
    /// Returns error if the backing file cannot be removed
    fn drop_keyspace(&self, keyspace: &Keyspace) -> Result<()>;

    /// Check if a keyspace holds any data.
    ///
    /// # Errors
    /// Returns error if the backing storage cannot be inspected
    fn contains_keyspace(&self, keyspace: &Keyspace) -> Result<bool>;

    /// List all keyspaces, sorted by name.
    ///
    /// # Errors
    /// Returns error if the backing storage cannot be listed
    fn list_keyspaces(&self) -> Result<Vec<Keyspace>>;

    /// Flush and evict any cached state for a keyspace. Data stays durable.
    ///
    /// # Errors
    /// Returns error if a pending flush fails
    fn close_keyspace(&self, keyspace: &Keyspace) -> Result<()>;

    /// Which implementation this is.
    fn kind(&self) -> StorageKind;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyspace_keeps_safe_characters() {
        let ks = Keyspace::new("Diabetes_v2-final.min_max_scaler");
        assert_eq!(ks.as_str(), "Diabetes_v2-final.min_max_scaler");
    }

    #[test]
    fn test_keyspace_escapes_path_separators() {
        let ks = Keyspace::new("../etc/passwd");
        assert!(!ks.as_str().contains('/'));
        assert_eq!(ks.as_str(), "..%2Fetc%2Fpasswd");
    }

    #[test]
    fn test_keyspace_escapes_spaces_and_unicode() {
        let ks = Keyspace::new("heart disease é");
        assert_eq!(ks.as_str(), "heart%20disease%20%C3%A9");
    }

    #[test]
    fn test_keyspace_is_deterministic() {
        assert_eq!(Keyspace::new("model x"), Keyspace::new("model x"));
        assert_ne!(Keyspace::new("model x"), Keyspace::new("model_x"));
    }

    #[test]
    fn test_storage_kind_as_str() {
        assert_eq!(StorageKind::InMemory.as_str(), "in-memory");
        assert_eq!(StorageKind::Persistent.as_str(), "persistent");
    }
}
