//! Error types for trueno-pipeline
//!
//! Toyota Way: Clear error messages with actionable guidance (Respect for People)

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// trueno-pipeline error types
///
/// Every error is returned to the immediate caller. Nothing is retried or
/// rolled back automatically: a pipeline stops at the first failing stage and
/// state already persisted by earlier stages stays until deleted explicitly.
#[derive(Error, Debug)]
pub enum Error {
    /// Transform/predict saw a column the stage was not fit on
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Transform/predict before fit or load
    #[error("Stage not fitted: {0}\nCall fit() or Stage::load() first")]
    NotFitted(String),

    /// Fit called twice without reset
    #[error("Stage already fitted: {0}\nCall reset() before fitting again")]
    AlreadyFitted(String),

    /// Operation on a closed stage or dataframe
    #[error("Stage closed: {0}\nCall reload() or Stage::load() to restore its parameters")]
    Closed(String),

    /// Operation on a deleted stage
    #[error("Stage deleted: {0}")]
    Deleted(String),

    /// Load of a keyspace that does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed tabular input
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Train fraction outside (0, 1)
    #[error("Invalid train fraction: {0} (must be strictly between 0 and 1)")]
    InvalidFraction(f64),

    /// Persisted manifest names a different stage type
    #[error("Stage type mismatch: expected {expected}, found {found}")]
    StageTypeMismatch {
        /// Stage type requested by the caller
        expected: String,
        /// Stage type recorded in the keyspace
        found: String,
    },

    /// Pipeline composition rules violated
    #[error("Invalid pipeline: {0}")]
    InvalidPipeline(String),

    /// Invalid argument
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Storage error (page codec, corrupt page, serialization)
    #[error("Storage error: {0}")]
    StorageError(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Self::StorageError(format!("serialization failed: {err}"))
    }
}
