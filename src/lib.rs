//! # Conflux
//!
//! Embedded AI data layer: documents in, model outputs and vector search out.
//!
//! Conflux keeps documents in tables and lets you attach components to them:
//! models compute outputs, listeners run a model over the documents of a
//! table, and vector indexes make a listener's outputs searchable.
//!
//! ## Quick Start
//!
//! ```ignore
//! use confluxdb::prelude::*;
//! use std::sync::Arc;
//!
//! let db = Datalayer::new()?;
//!
//! // A model producing 2-dimensional vectors
//! let encoder = FnModel::new("encoder", |inputs: &ModelInputs| {
//!     let len = inputs.args[0].as_str().map(str::len).unwrap_or(0);
//!     Ok(Value::from(vec![len as f64, 1.0]))
//! })
//! .with_signature(Signature::Singleton)
//! .with_datatype(vector(&[2])?);
//! db.apply(Arc::new(encoder) as Arc<dyn Model>)?;
//!
//! // Compute outputs for `docs.text` and index them
//! db.apply(Listener::new("embed", "encoder", "text", Select::table("docs")))?;
//! db.apply(VectorIndex::new("docs-idx", Ref::by_id("embed")))?;
//!
//! db.insert("docs", vec![Document::from_json(json!({"text": "hello"}))])?;
//! db.process_events()?;
//! db.run_jobs()?;
//!
//! let query = db.nearest_query(Document::from_json(json!({"text": "hi"})));
//! let nearest = db.select_nearest("docs-idx", &query)?;
//! ```
//!
//! ## Change propagation
//!
//! Mutations publish one event per document id to every consuming
//! component. [`Datalayer::process_events`] merges the buffered events per
//! destination and turns them into jobs; [`Datalayer::run_jobs`] executes
//! them in dependency order. When a CDC service is running, vector copies
//! are left to it.
//!
//! ## Components
//!
//! - [`Model`] - prediction interface; [`FnModel`] wraps a closure
//! - [`Listener`] - model bound to a [`Select`] query
//! - [`VectorIndex`] - nearest-neighbour search over a listener's outputs

#![warn(missing_docs)]

mod component;
mod config;
mod datalayer;
mod error;
mod store;
mod types;

pub mod prelude;
pub mod tasks;

// Re-export main entry points
pub use datalayer::{Datalayer, DatalayerBuilder, DatalayerStats};
pub use error::{Error, Result};

// Re-export configuration and storage
pub use component::{Component, MODEL_TYPE_ID};
pub use config::{CdcConfig, Config, SearcherConfig};
pub use store::{DocumentStore, InMemoryStore};

// Re-export types
pub use types::*;
