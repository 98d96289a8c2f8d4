//! Listeners
//!
//! A [`Listener`] binds a model to the documents selected by a [`Select`]
//! query: every matching document is projected through the listener key,
//! passed to the model, and the output is stored under
//! `_outputs.<listener identifier>`.

use crate::model::Model;
use conflux_core::variables::replace_in_str;
use conflux_core::{
    find_variables, replace_variables, Bindings, Document, Identified, KeyType, Leaf, LeafRef,
    Map, Ref, Value, OUTPUTS_FIELD,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Component type id of listeners.
pub const LISTENER_TYPE_ID: &str = "listener";

/// A table scan with equality filters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Select {
    /// Table to read
    pub table: String,
    /// Field path to required value
    #[serde(default)]
    pub filter: Map,
}

impl Select {
    /// Select every document of `table`
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filter: Map::new(),
        }
    }

    /// Add an equality filter on a field path
    pub fn filter(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter.insert(path.into(), value.into());
        self
    }

    /// True when `doc` satisfies every filter
    pub fn matches(&self, doc: &Document) -> bool {
        self.filter
            .iter()
            .all(|(path, expected)| doc.get_path(path) == Some(expected))
    }

    /// Serialized form carried in job arguments
    pub fn encode(&self) -> Value {
        let mut out = Map::new();
        out.insert("table".to_string(), Value::from(self.table.as_str()));
        out.insert("filter".to_string(), Value::Object(self.filter.clone()));
        Value::Object(out)
    }

    /// Inverse of [`Select::encode`]
    pub fn decode(value: &Value) -> Option<Select> {
        let obj = value.as_object()?;
        let table = obj.get("table")?.as_str()?.to_string();
        let filter = match obj.get("filter") {
            Some(Value::Object(f)) => f.clone(),
            Some(_) => return None,
            None => Map::new(),
        };
        Some(Select { table, filter })
    }
}

/// Model applied to the documents of a select query.
#[derive(Debug, Clone)]
pub struct Listener {
    /// Listener identifier
    pub identifier: String,
    /// Model producing outputs
    pub model: Ref<dyn Model>,
    /// Input fields
    pub key: KeyType,
    /// Documents listened to
    pub select: Select,
}

impl Listener {
    /// New listener with an unresolved model reference
    pub fn new(
        identifier: impl Into<String>,
        model: impl Into<String>,
        key: impl Into<KeyType>,
        select: Select,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            model: Ref::by_id(model),
            key: key.into(),
            select,
        }
    }

    /// New listener around an already loaded model
    pub fn with_model(
        identifier: impl Into<String>,
        model: Arc<dyn Model>,
        key: impl Into<KeyType>,
        select: Select,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            model: Ref::Resolved(model),
            key: key.into(),
            select,
        }
    }

    /// Dotted path of this listener's outputs inside a document
    pub fn outputs_key(&self) -> String {
        format!("{}.{}", OUTPUTS_FIELD, self.identifier)
    }

    /// Copy with `bindings` substituted into identifier, model reference, key and select.
    ///
    /// A resolved model is kept as-is.
    pub fn set_variables(&self, bindings: &Bindings) -> Listener {
        let identifier = string_or(replace_in_str(&self.identifier, bindings), &self.identifier);
        let model = match &self.model {
            Ref::Unresolved(id) => Ref::Unresolved(string_or(replace_in_str(id, bindings), id)),
            resolved => resolved.clone(),
        };
        let key = KeyType::from_value(&replace_variables(&self.key.to_value(), bindings))
            .unwrap_or_else(|| self.key.clone());
        let select = Select::decode(&replace_variables(&self.select.encode(), bindings))
            .unwrap_or_else(|| self.select.clone());
        Listener {
            identifier,
            model,
            key,
            select,
        }
    }
}

fn string_or(value: Value, fallback: &str) -> String {
    match value {
        Value::String(s) => s,
        _ => fallback.to_string(),
    }
}

impl Identified for Listener {
    fn identifier(&self) -> &str {
        &self.identifier
    }
}

impl Leaf for Listener {
    fn variables(&self) -> Vec<String> {
        find_variables(&self.to_value())
    }

    fn with_variables(&self, bindings: &Bindings) -> LeafRef {
        Arc::new(self.set_variables(bindings))
    }

    fn to_value(&self) -> Value {
        let mut out = Map::new();
        out.insert("type_id".to_string(), Value::from(LISTENER_TYPE_ID));
        out.insert("identifier".to_string(), Value::from(self.identifier.as_str()));
        out.insert("model".to_string(), Value::from(self.model.identifier()));
        out.insert("key".to_string(), self.key.to_value());
        out.insert("select".to_string(), self.select.encode());
        Value::Object(out)
    }
}
