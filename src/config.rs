//! Process-wide configuration
//!
//! A [`Config`] is read once (builder, JSON document, or environment) and then
//! applied to every stage and splitter created from the
//! [`Context`](crate::context::Context) built from it. There is no hidden
//! global default: each context owns its own storage engine.
//!
//! ```rust
//! use trueno_pipeline::config::{Config, StorageConfig};
//!
//! let config = Config::builder()
//!     .storage(StorageConfig::InMemory)
//!     .random_seed(42)
//!     .concurrency(true)
//!     .max_threads_per_task(4)
//!     .build()
//!     .unwrap();
//! assert_eq!(config.max_threads_per_task, 4);
//! ```

use crate::storage::{PageCodec, StorageKind};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable selecting the storage engine (`in-memory` | `persistent`)
pub const ENV_STORAGE: &str = "TRUENO_PIPELINE_STORAGE";
/// Environment variable naming the persistent storage root
pub const ENV_ROOT: &str = "TRUENO_PIPELINE_ROOT";
/// Environment variable with the global random seed
pub const ENV_SEED: &str = "TRUENO_PIPELINE_SEED";
/// Environment variable enabling intra-stage concurrency (`true` | `false`)
pub const ENV_CONCURRENCY: &str = "TRUENO_PIPELINE_CONCURRENCY";
/// Environment variable with the worker pool size
pub const ENV_MAX_THREADS: &str = "TRUENO_PIPELINE_MAX_THREADS";

/// Default random seed
pub const DEFAULT_SEED: u64 = 42;

/// Storage engine selection
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "engine", rename_all = "kebab-case")]
pub enum StorageConfig {
    /// Ephemeral process-local maps
    #[default]
    InMemory,
    /// Disk-backed pages under `root`
    Persistent {
        /// Directory holding one page file per keyspace
        root: PathBuf,
        /// Page compression
        #[serde(default)]
        codec: PageCodec,
    },
}

impl StorageConfig {
    /// Persistent storage rooted at `root` with uncompressed pages.
    pub fn persistent(root: impl Into<PathBuf>) -> Self {
        Self::Persistent {
            root: root.into(),
            codec: PageCodec::None,
        }
    }

    /// Which engine this selects.
    #[must_use]
    pub const fn kind(&self) -> StorageKind {
        match self {
            Self::InMemory => StorageKind::InMemory,
            Self::Persistent { .. } => StorageKind::Persistent,
        }
    }
}

/// Configuration applied to every stage/splitter of a context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Storage engine selection
    #[serde(default)]
    pub storage: StorageConfig,
    /// Global random seed for the context's RNG
    #[serde(default = "default_seed")]
    pub random_seed: u64,
    /// Enable intra-stage parallelism
    #[serde(default = "default_concurrency")]
    pub concurrency: bool,
    /// Worker pool size per task
    #[serde(default = "default_max_threads")]
    pub max_threads_per_task: usize,
}

const fn default_seed() -> u64 {
    DEFAULT_SEED
}

const fn default_concurrency() -> bool {
    true
}

fn default_max_threads() -> usize {
    std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            random_seed: default_seed(),
            concurrency: default_concurrency(),
            max_threads_per_task: default_max_threads(),
        }
    }
}

impl Config {
    /// Create a new config builder
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Parse a JSON document. Missing fields take their defaults.
    ///
    /// # Errors
    /// Returns error if the JSON is malformed or the values are invalid
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::InvalidInput(format!("config JSON: {e}")))?;
        config.validate()
    }

    /// Read and parse a JSON config file.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Read the `TRUENO_PIPELINE_*` environment variables.
    ///
    /// # Errors
    /// Returns error if a variable holds an unparsable value
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup (testable form of [`from_env`](Self::from_env)).
    ///
    /// # Errors
    /// Returns error if a variable holds an unparsable value
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut builder = Self::builder();

        match lookup(ENV_STORAGE).as_deref() {
            None | Some("in-memory") => {}
            Some("persistent") => {
                let root = lookup(ENV_ROOT).ok_or_else(|| {
                    Error::InvalidInput(format!("{ENV_STORAGE}=persistent requires {ENV_ROOT}"))
                })?;
                builder = builder.storage(StorageConfig::persistent(root));
            }
            Some(other) => {
                return Err(Error::InvalidInput(format!(
                    "{ENV_STORAGE} must be 'in-memory' or 'persistent', got '{other}'"
                )))
            }
        }

        if let Some(seed) = lookup(ENV_SEED) {
            let seed = seed
                .parse()
                .map_err(|e| Error::InvalidInput(format!("{ENV_SEED}: {e}")))?;
            builder = builder.random_seed(seed);
        }
        if let Some(flag) = lookup(ENV_CONCURRENCY) {
            let flag = flag
                .parse()
                .map_err(|e| Error::InvalidInput(format!("{ENV_CONCURRENCY}: {e}")))?;
            builder = builder.concurrency(flag);
        }
        if let Some(threads) = lookup(ENV_MAX_THREADS) {
            let threads = threads
                .parse()
                .map_err(|e| Error::InvalidInput(format!("{ENV_MAX_THREADS}: {e}")))?;
            builder = builder.max_threads_per_task(threads);
        }

        builder.build()
    }

    fn validate(self) -> Result<Self> {
        if self.max_threads_per_task == 0 {
            return Err(Error::InvalidInput(
                "max_threads_per_task must be at least 1".to_string(),
            ));
        }
        Ok(self)
    }
}

/// Config builder
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set storage engine selection
    #[must_use]
    pub fn storage(mut self, storage: StorageConfig) -> Self {
        self.config.storage = storage;
        self
    }

    /// Set global random seed
    #[must_use]
    pub const fn random_seed(mut self, seed: u64) -> Self {
        self.config.random_seed = seed;
        self
    }

    /// Enable or disable intra-stage parallelism
    #[must_use]
    pub const fn concurrency(mut self, enabled: bool) -> Self {
        self.config.concurrency = enabled;
        self
    }

    /// Set worker pool size per task
    #[must_use]
    pub const fn max_threads_per_task(mut self, threads: usize) -> Self {
        self.config.max_threads_per_task = threads;
        self
    }

    /// Build the config
    ///
    /// # Errors
    ///
    /// Returns error if `max_threads_per_task` is zero
    pub fn build(self) -> Result<Config> {
        self.config.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.storage, StorageConfig::InMemory);
        assert_eq!(config.random_seed, DEFAULT_SEED);
        assert!(config.concurrency);
        assert!(config.max_threads_per_task >= 1);
    }

    #[test]
    fn test_builder_rejects_zero_threads() {
        let err = Config::builder().max_threads_per_task(0).build().unwrap_err();
        assert!(err.to_string().contains("max_threads_per_task"));
    }

    #[test]
    fn test_from_json_with_defaults() {
        let config = Config::from_json(r#"{"random_seed": 7}"#).unwrap();
        assert_eq!(config.random_seed, 7);
        assert_eq!(config.storage, StorageConfig::InMemory);
    }

    #[test]
    fn test_from_json_persistent() {
        let config = Config::from_json(
            r#"{
                "storage": {"engine": "persistent", "root": "/tmp/models"},
                "concurrency": false,
                "max_threads_per_task": 2
            }"#,
        )
        .unwrap();
        assert_eq!(config.storage, StorageConfig::persistent("/tmp/models"));
        assert_eq!(config.storage.kind(), StorageKind::Persistent);
        assert!(!config.concurrency);
        assert_eq!(config.max_threads_per_task, 2);
    }

    #[test]
    fn test_from_json_rejects_unknown_engine() {
        let err = Config::from_json(r#"{"storage": {"engine": "s3"}}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (ENV_STORAGE, "persistent"),
            (ENV_ROOT, "/data"),
            (ENV_SEED, "1"),
            (ENV_CONCURRENCY, "false"),
            (ENV_MAX_THREADS, "3"),
        ]);
        let config = Config::from_lookup(|k| vars.get(k).map(|v| (*v).to_string())).unwrap();

        assert_eq!(config.storage, StorageConfig::persistent("/data"));
        assert_eq!(config.random_seed, 1);
        assert!(!config.concurrency);
        assert_eq!(config.max_threads_per_task, 3);
    }

    #[test]
    fn test_from_lookup_errors() {
        let missing_root = Config::from_lookup(|k| (k == ENV_STORAGE).then(|| "persistent".into()));
        assert!(missing_root.is_err());

        let bad_seed = Config::from_lookup(|k| (k == ENV_SEED).then(|| "abc".into()));
        assert!(bad_seed.unwrap_err().to_string().contains(ENV_SEED));

        let bad_engine = Config::from_lookup(|k| (k == ENV_STORAGE).then(|| "mapdb".into()));
        assert!(bad_engine.is_err());
    }

    #[test]
    fn test_config_json_round_trip() {
        let config = Config::builder()
            .storage(StorageConfig::persistent("/srv"))
            .random_seed(9)
            .build()
            .unwrap();
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(Config::from_json(&json).unwrap(), config);
    }
}
