//! Core types for Conflux
//!
//! This crate defines the data shared by every other layer:
//! - Value: the closed value type flowing through documents and configuration
//! - Document: string-keyed records with dotted-path access
//! - Event: change records, merge and grouping
//! - variables: `<var:NAME>` discovery and substitution
//! - Ref: identifier-or-object component references
//! - KeyType: how a listener reads its inputs from a document

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod document;
pub mod error;
pub mod event;
pub mod key;
pub mod reference;
pub mod value;
pub mod variables;

pub use document::{Document, FOLD_FIELD, OUTPUTS_FIELD};
pub use error::{ConfluxError, Result};
pub use event::{
    extract_job_ids, group_and_merge_by_type, new_uuid, ComponentRef, Event, EventType,
    MergedEvents,
};
pub use key::{KeyType, BASE_KEY};
pub use reference::{Identified, Ref};
pub use value::{LeafRef, Map, Value};
pub use variables::{find_variables, replace_variables, Bindings, Leaf};
