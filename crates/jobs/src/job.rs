//! Job definitions
//!
//! A job is a unit of deferred work against a component. Jobs created from
//! events reuse the event uuid as their id so that the same event can never
//! be scheduled twice.

use chrono::{DateTime, Utc};
use conflux_core::{new_uuid, Map, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Submitted, not started
    Pending,
    /// Handler is executing
    Running,
    /// Handler returned successfully
    Success,
    /// Handler failed, or a dependency failed
    Failed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Success => "success",
            JobStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// What a job does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "callable", rename_all = "snake_case")]
pub enum JobKind {
    /// Copy indexing-listener outputs into a vector searcher.
    ///
    /// Empty `ids` means every document matched by `query`.
    CopyVectors {
        /// Target vector index identifier
        vector_index: String,
        /// Documents to copy
        ids: Vec<String>,
        /// Serialized select of the indexing listener
        query: Value,
    },
    /// Remove vectors from a searcher
    DeleteVectors {
        /// Target vector index identifier
        vector_index: String,
        /// Documents to remove
        ids: Vec<String>,
    },
    /// Compute listener outputs for documents.
    ///
    /// Empty `ids` means every document matched by the listener's select.
    RunListener {
        /// Listener identifier
        listener: String,
        /// Documents to process
        ids: Vec<String>,
    },
}

impl JobKind {
    /// Name of the task this job runs
    pub fn name(&self) -> &'static str {
        match self {
            JobKind::CopyVectors { .. } => "copy_vectors",
            JobKind::DeleteVectors { .. } => "delete_vectors",
            JobKind::RunListener { .. } => "run_listener",
        }
    }

    /// Keyword arguments as a value object
    pub fn args(&self) -> Value {
        let ids_value = |ids: &[String]| Value::Array(ids.iter().map(|i| Value::from(i.as_str())).collect());
        let mut args = Map::new();
        match self {
            JobKind::CopyVectors {
                vector_index,
                ids,
                query,
            } => {
                args.insert("vector_index".to_string(), Value::from(vector_index.as_str()));
                args.insert("ids".to_string(), ids_value(ids));
                args.insert("query".to_string(), query.clone());
            }
            JobKind::DeleteVectors { vector_index, ids } => {
                args.insert("vector_index".to_string(), Value::from(vector_index.as_str()));
                args.insert("ids".to_string(), ids_value(ids));
            }
            JobKind::RunListener { listener, ids } => {
                args.insert("listener".to_string(), Value::from(listener.as_str()));
                args.insert("ids".to_string(), ids_value(ids));
            }
        }
        Value::Object(args)
    }
}

/// A scheduled unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique id (32 hex chars)
    pub id: String,
    /// Task and arguments
    pub kind: JobKind,
    /// Jobs that must succeed first
    pub dependencies: Vec<String>,
    /// Current status
    pub status: JobStatus,
    /// Submission time
    pub created_at: DateTime<Utc>,
    /// Failure reason, when failed
    pub error: Option<String>,
}

impl Job {
    /// New pending job with a fresh id
    pub fn new(kind: JobKind) -> Self {
        Self::with_id(new_uuid(), kind)
    }

    /// New pending job with an explicit id (usually an event uuid)
    pub fn with_id(id: impl Into<String>, kind: JobKind) -> Self {
        Self {
            id: id.into(),
            kind,
            dependencies: Vec::new(),
            status: JobStatus::Pending,
            created_at: Utc::now(),
            error: None,
        }
    }

    /// True once the job can no longer change status
    pub fn is_finished(&self) -> bool {
        matches!(self.status, JobStatus::Success | JobStatus::Failed)
    }
}
