//! Convenient imports for Conflux.
//!
//! This module re-exports the most commonly used types so you can get started
//! with a single import:
//!
//! ```ignore
//! use confluxdb::prelude::*;
//!
//! let db = Datalayer::new()?;
//! db.insert("docs", vec![Document::from_json(json!({"text": "hello"}))])?;
//! ```

// Main entry point
pub use crate::datalayer::{Datalayer, DatalayerBuilder};

// Error handling
pub use crate::error::{Error, Result};

// Components
pub use crate::component::Component;
pub use crate::types::{FnModel, Listener, Model, ModelInputs, Select, Signature, VectorIndex};

// Core types
pub use crate::types::{Bindings, Document, KeyType, Ref, Value};

// Vector types
pub use crate::types::{sqlvector, vector, Measure, Nearest, NearestQuery};

// Re-export serde_json for convenience
pub use serde_json::json;
