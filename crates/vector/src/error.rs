//! Vector-specific error types

use conflux_core::ConfluxError;
use conflux_jobs::JobError;
use thiserror::Error;

/// Errors for vector index, searcher and model operations
#[derive(Debug, Error)]
pub enum VectorError {
    /// Dimension mismatch between a vector and its searcher or between listeners
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Expected dimension
        expected: usize,
        /// Actual dimension provided
        got: usize,
    },

    /// No searcher registered for a vector index
    #[error("No searcher for vector index: {0}")]
    SearcherNotFound(String),

    /// No model registered under an identifier
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Id not present in a searcher
    #[error("Vector not found: {0}")]
    VectorNotFound(String),

    /// Unknown measure name
    #[error("Invalid measure: {0}")]
    InvalidMeasure(String),

    /// Datatype carries no shape
    #[error("Couldn't get shape of model outputs from model {0}")]
    MissingShape(String),

    /// Shape list was empty
    #[error("Shape must have at least one dimension")]
    EmptyShape,

    /// Model output could not be read as an embedding
    #[error("Invalid embedding: {0}")]
    InvalidEmbedding(String),

    /// Model inputs do not fit the model signature
    #[error("Invalid model input: {0}")]
    InvalidInput(String),

    /// Model prediction failed
    #[error("Prediction failed for {model}: {reason}")]
    Prediction {
        /// Model identifier
        model: String,
        /// Failure description
        reason: String,
    },

    /// Core error (key resolution, invariants, dtype, references)
    #[error(transparent)]
    Core(#[from] ConfluxError),

    /// Job scheduling error
    #[error(transparent)]
    Job(#[from] JobError),
}

/// Result type for vector operations
pub type VectorResult<T> = std::result::Result<T, VectorError>;

impl VectorError {
    /// True when the error reports an unknown entity
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            VectorError::SearcherNotFound(_)
                | VectorError::ModelNotFound(_)
                | VectorError::VectorNotFound(_)
                | VectorError::Core(ConfluxError::NotFound(_))
        )
    }
}
