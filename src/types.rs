//! Public types for the Conflux API.
//!
//! This module re-exports types from the member crates with a clean public interface.

// Core value types
pub use conflux_core::{Document, Value, FOLD_FIELD, OUTPUTS_FIELD};

// Variables
pub use conflux_core::{find_variables, replace_variables, Bindings, Leaf};

// Keys and references
pub use conflux_core::{Identified, KeyType, Ref, BASE_KEY};

// Events
pub use conflux_core::{
    group_and_merge_by_type, ComponentRef, Event, EventType, MergedEvents,
};

// Models and listeners
pub use conflux_vector::{
    FnModel, Listener, MappedInput, Mapping, Model, ModelInputs, ModelRegistry, Select,
    Signature, LISTENER_TYPE_ID,
};

// Vector indexing
pub use conflux_vector::{
    sqlvector, vector, DataType, Encodable, InMemorySearcher, Measure, Nearest, NearestQuery,
    ResolvedVector, SearcherKind, SearcherRegistry, VectorIndex, VectorSearcher,
    VECTOR_INDEX_TYPE_ID,
};

// Jobs
pub use conflux_jobs::{
    CdcFlag, CdcStatus, EventBatch, EventQueue, Job, JobKind, JobQueue, JobStatus,
    LocalJobQueue, RunSummary,
};
