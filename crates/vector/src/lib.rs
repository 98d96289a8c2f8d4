//! Vector indexing for Conflux
//!
//! This crate provides:
//! - Measure: similarity measures normalized to "higher = more similar"
//! - DataType: `vector` / `sqlvector` storage representations
//! - VectorSearcher: nearest-neighbour search, with an in-memory brute-force backend
//! - Model: prediction interface, closure-backed models and a registry
//! - Listener / Select: models bound to document queries
//! - VectorIndex: query resolution, nearest search and job scheduling

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod datatype;
pub mod error;
pub mod index;
pub mod listener;
pub mod measure;
pub mod model;
pub mod searcher;

pub use datatype::{
    decode_array, encode_array, sqlvector, str_shape, vector, DataType, Encodable, NumericArray,
};
pub use error::{VectorError, VectorResult};
pub use index::{
    NearestQuery, ResolvedVector, VectorIndex, DEFAULT_ID_FIELD, DEFAULT_N, VECTOR_INDEX_TYPE_ID,
};
pub use listener::{Listener, Select, LISTENER_TYPE_ID};
pub use measure::Measure;
pub use model::{
    embedding_from_value, FnModel, MappedInput, Mapping, Model, ModelInputs, ModelRegistry,
    Signature,
};
pub use searcher::{InMemorySearcher, Nearest, SearcherKind, SearcherRegistry, VectorSearcher};
