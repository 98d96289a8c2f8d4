//! Error types for conflux-core.
//!
//! `ConfluxError` is shared by every crate in the workspace; the vector and
//! jobs crates wrap it rather than re-declaring the common variants.

use thiserror::Error;

/// Errors raised by core data-layer operations.
#[derive(Debug, Error)]
pub enum ConfluxError {
    /// No listener key matched the query document and no `_base` fallback exists
    #[error("Keys in provided {keys:?} don't match VectorIndex keys: {models_keys:?}, with model: {models:?}")]
    KeyResolution {
        /// Keys present on the query document
        keys: Vec<String>,
        /// Keys the index's listeners consume
        models_keys: Vec<String>,
        /// Model identifiers paired with those keys
        models: Vec<String>,
    },

    /// An internal construction invariant did not hold
    #[error("invariant violated: {0}")]
    Invariant(String),

    /// Two events could not be merged
    #[error("incompatible events: {0}")]
    IncompatibleEvents(String),

    /// Array element type is not what the codec accepts
    #[error("dtype was {actual}, expected {expected}")]
    DtypeMismatch {
        /// Element type the codec accepts
        expected: String,
        /// Element type that was supplied
        actual: String,
    },

    /// A component reference was used before it was resolved
    #[error("reference not resolved: {0}")]
    UnresolvedReference(String),

    /// Entity not found (component, document, vector)
    #[error("not found: {0}")]
    NotFound(String),

    /// Caller supplied an unusable argument
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Serialization or parsing error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Internal error (bug)
    #[error("internal error: {0}")]
    Internal(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, ConfluxError>;

impl ConfluxError {
    /// Shorthand for [`ConfluxError::NotFound`].
    pub fn not_found(what: impl Into<String>) -> Self {
        ConfluxError::NotFound(what.into())
    }

    /// Shorthand for [`ConfluxError::InvalidInput`].
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        ConfluxError::InvalidInput(msg.into())
    }

    /// True for errors caused by a bug rather than by user input.
    pub fn is_programming_error(&self) -> bool {
        matches!(
            self,
            ConfluxError::Invariant(_)
                | ConfluxError::IncompatibleEvents(_)
                | ConfluxError::Internal(_)
        )
    }
}

impl From<serde_json::Error> for ConfluxError {
    fn from(e: serde_json::Error) -> Self {
        ConfluxError::Serialization(e.to_string())
    }
}
