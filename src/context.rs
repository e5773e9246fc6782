//! Runtime context shared by stages, pipelines, and splitters
//!
//! A [`Context`] is built once from a [`Config`] and owns:
//! - the storage engine (the only object shared across stage instances)
//! - the RNG context ([`RngContext`]) - explicit seed, no process-wide state
//! - the bounded worker pool ([`Executor`]) used inside a single stage's fit
//!
//! Cloning a context is cheap and shares all three.

use crate::config::{Config, StorageConfig};
use crate::storage::{MemoryStorage, PersistentStorage, StorageEngine};
use crate::{Error, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::debug;

/// Runtime handle built from a [`Config`].
#[derive(Debug, Clone)]
pub struct Context {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    config: Config,
    storage: Arc<dyn StorageEngine>,
    executor: Executor,
}

impl Context {
    /// Build a context, constructing the storage engine the config selects.
    ///
    /// # Errors
    /// Returns error if the persistent root cannot be created or the worker
    /// pool cannot be started
    pub fn new(config: Config) -> Result<Self> {
        let storage: Arc<dyn StorageEngine> = match &config.storage {
            StorageConfig::InMemory => Arc::new(MemoryStorage::new()),
            StorageConfig::Persistent { root, codec } => {
                Arc::new(PersistentStorage::open(root, *codec)?)
            }
        };
        Self::with_storage(config, storage)
    }

    /// Build a context around an existing storage engine.
    ///
    /// Useful for sharing one engine between contexts with different seeds.
    ///
    /// # Errors
    /// Returns error if the worker pool cannot be started
    pub fn with_storage(config: Config, storage: Arc<dyn StorageEngine>) -> Result<Self> {
        let executor = if config.concurrency {
            Executor::with_threads(config.max_threads_per_task)?
        } else {
            Executor::serial()
        };
        debug!(
            storage = storage.kind().as_str(),
            seed = config.random_seed,
            threads = executor.threads(),
            "created context"
        );
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                storage,
                executor,
            }),
        })
    }

    /// Configuration this context was built from.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Shared storage engine.
    #[must_use]
    pub fn storage(&self) -> &Arc<dyn StorageEngine> {
        &self.inner.storage
    }

    /// Root RNG context seeded from the configured seed.
    #[must_use]
    pub fn rng(&self) -> RngContext {
        RngContext::new(self.inner.config.random_seed)
    }

    /// Worker pool for intra-stage parallelism.
    #[must_use]
    pub fn executor(&self) -> &Executor {
        &self.inner.executor
    }
}

/// Explicit, copyable source of reproducible randomness.
///
/// Forking derives an independent stream per label, so two stages fit
/// concurrently never draw from the same generator and the draws of one stage
/// do not depend on how many others ran before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RngContext {
    seed: u64,
}

impl RngContext {
    /// Context with an explicit seed.
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Seed of this context.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Derive an independent child context for `label`.
    #[must_use]
    pub fn fork(&self, label: &str) -> Self {
        // FNV-1a over the label, then splitmix64 to decorrelate nearby seeds.
        // Fitted k-means state replays only if this derivation never changes.
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in label.bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Self::new(splitmix64(self.seed ^ hash))
    }

    /// Fresh generator positioned at the start of this context's stream.
    #[must_use]
    pub fn generator(&self) -> StdRng {
        StdRng::seed_from_u64(self.seed)
    }
}

const fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Bounded worker pool, or inline execution when concurrency is disabled.
///
/// Results always come back in input order, so parallel and serial runs of
/// the same fit produce identical learned state.
#[derive(Debug, Clone)]
pub struct Executor {
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl Executor {
    /// Run everything on the calling thread.
    #[must_use]
    pub const fn serial() -> Self {
        Self { pool: None }
    }

    /// Pool with exactly `threads` workers.
    ///
    /// # Errors
    /// Returns error if `threads` is zero or the pool cannot be started
    pub fn with_threads(threads: usize) -> Result<Self> {
        if threads == 0 {
            return Err(Error::InvalidInput(
                "worker pool needs at least 1 thread".to_string(),
            ));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("trueno-pipeline-{i}"))
            .build()
            .map_err(|e| Error::Other(format!("failed to start worker pool: {e}")))?;
        Ok(Self {
            pool: Some(Arc::new(pool)),
        })
    }

    /// Whether work is dispatched to a pool.
    #[must_use]
    pub const fn is_parallel(&self) -> bool {
        self.pool.is_some()
    }

    /// Number of worker threads (1 when serial).
    #[must_use]
    pub fn threads(&self) -> usize {
        self.pool
            .as_ref()
            .map_or(1, |pool| pool.current_num_threads())
    }

    /// Apply `f` to every item, preserving input order in the output.
    pub fn map<T, R, F>(&self, items: Vec<T>, f: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Sync + Send,
    {
        match &self.pool {
            Some(pool) => pool.install(|| items.into_par_iter().map(&f).collect()),
            None => items.into_iter().map(f).collect(),
        }
    }
}
