//! Unified error types for Conflux.
//!
//! This module provides a clean error type that wraps the member crates'
//! errors and presents a consistent interface to users.

use conflux_core::ConfluxError;
use conflux_jobs::JobError;
use conflux_vector::VectorError;
use thiserror::Error;

/// All Conflux errors.
///
/// This is the canonical error type for all data-layer operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Entity not found (component, document, searcher, vector, job)
    #[error("not found: {0}")]
    NotFound(String),

    /// Query document keys match none of a vector index's listeners
    #[error("Keys in provided {keys:?} don't match VectorIndex keys: {models_keys:?}, with model: {models:?}")]
    KeyResolution {
        /// Keys present on the query document
        keys: Vec<String>,
        /// Keys the index's listeners consume
        models_keys: Vec<String>,
        /// Model identifiers paired with those keys
        models: Vec<String>,
    },

    /// Array element type rejected by a codec
    #[error("dtype was {actual}, expected {expected}")]
    DtypeMismatch {
        /// Accepted element type
        expected: String,
        /// Supplied element type
        actual: String,
    },

    /// Vector dimensions disagree
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Expected dimension
        expected: usize,
        /// Actual dimension
        got: usize,
    },

    /// Invalid argument or component definition
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Configuration could not be loaded or is invalid
    #[error("config error: {0}")]
    Config(String),

    /// Job submission or execution error
    #[error("job error: {0}")]
    Job(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Internal error (bug or invariant violation)
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for Conflux operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Check if a query failed to match any listener key.
    pub fn is_key_resolution(&self) -> bool {
        matches!(self, Error::KeyResolution { .. })
    }

    /// Check if this is a codec element type error.
    pub fn is_dtype_mismatch(&self) -> bool {
        matches!(self, Error::DtypeMismatch { .. })
    }

    /// Check if this is a serious/unrecoverable error.
    pub fn is_serious(&self) -> bool {
        matches!(self, Error::Internal(_))
    }
}

// Convert from core errors
impl From<ConfluxError> for Error {
    fn from(e: ConfluxError) -> Self {
        match e {
            ConfluxError::KeyResolution {
                keys,
                models_keys,
                models,
            } => Error::KeyResolution {
                keys,
                models_keys,
                models,
            },
            ConfluxError::Invariant(msg) => Error::Internal(format!("invariant violated: {}", msg)),
            ConfluxError::IncompatibleEvents(msg) => {
                Error::Internal(format!("incompatible events: {}", msg))
            }
            ConfluxError::DtypeMismatch { expected, actual } => {
                Error::DtypeMismatch { expected, actual }
            }
            ConfluxError::UnresolvedReference(id) => {
                Error::Internal(format!("reference not resolved: {}", id))
            }
            ConfluxError::NotFound(what) => Error::NotFound(what),
            ConfluxError::InvalidInput(msg) => Error::InvalidInput(msg),
            ConfluxError::Serialization(msg) => Error::Serialization(msg),
            ConfluxError::Internal(msg) => Error::Internal(msg),
            ConfluxError::Io(io) => Error::Io(io),
        }
    }
}

// Convert from vector errors
impl From<VectorError> for Error {
    fn from(e: VectorError) -> Self {
        match e {
            VectorError::DimensionMismatch { expected, got } => {
                Error::DimensionMismatch { expected, got }
            }
            VectorError::SearcherNotFound(id) => Error::NotFound(format!("searcher {}", id)),
            VectorError::ModelNotFound(id) => Error::NotFound(format!("model {}", id)),
            VectorError::VectorNotFound(id) => Error::NotFound(format!("vector {}", id)),
            VectorError::Core(core) => Error::from(core),
            VectorError::Job(job) => Error::from(job),
            other => Error::InvalidInput(other.to_string()),
        }
    }
}

// Convert from job errors
impl From<JobError> for Error {
    fn from(e: JobError) -> Self {
        match e {
            JobError::NotFound(id) => Error::NotFound(format!("job {}", id)),
            JobError::Core(core) => Error::from(core),
            other => Error::Job(other.to_string()),
        }
    }
}

// Convert from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Convert from TOML parse errors
impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}
