//! Error types for the job layer.

use conflux_core::ConfluxError;
use thiserror::Error;

/// Errors raised while submitting or running jobs.
#[derive(Debug, Error)]
pub enum JobError {
    /// A job with this id was already submitted
    #[error("duplicate job id: {0}")]
    DuplicateJob(String),

    /// A dependency names a job the queue has never seen
    #[error("job {job} depends on unknown job {dependency}")]
    UnknownDependency {
        /// Job being submitted
        job: String,
        /// Missing dependency id
        dependency: String,
    },

    /// Dependency graph is not acyclic
    #[error("cycle detected involving job {0}")]
    CycleDetected(String),

    /// No job with this id
    #[error("job not found: {0}")]
    NotFound(String),

    /// The job handler reported a failure
    #[error("job handler failed: {0}")]
    Handler(String),

    /// Error from the core layer
    #[error(transparent)]
    Core(#[from] ConfluxError),
}

/// Result type for job operations.
pub type Result<T> = std::result::Result<T, JobError>;
