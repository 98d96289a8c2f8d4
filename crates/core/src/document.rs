//! Documents
//!
//! A [`Document`] is a string-keyed record. Nested fields are addressed with
//! dotted paths (`_outputs.encoder`), and model outputs live under the
//! reserved `_outputs` field.

use crate::value::{LeafRef, Map, Value};
use crate::variables::{find_variables, replace_variables, Bindings, Leaf};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Field under which model outputs are stored.
pub const OUTPUTS_FIELD: &str = "_outputs";

/// Field holding the train/valid split marker.
pub const FOLD_FIELD: &str = "_fold";

/// A string-keyed record of values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Map);

impl Document {
    /// Empty document
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a JSON object; non-object JSON yields an empty document.
    pub fn from_json(json: serde_json::Value) -> Self {
        match Value::from_json(json) {
            Value::Object(map) => Document(map),
            _ => Document::default(),
        }
    }

    /// JSON view of the document
    pub fn to_json(&self) -> serde_json::Value {
        Value::Object(self.0.clone()).to_json()
    }

    /// Top-level field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Field at a dotted path. A top-level key containing dots wins over traversal.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        if let Some(v) = self.0.get(path) {
            return Some(v);
        }
        let mut parts = path.split('.');
        let first = parts.next()?;
        let mut current = self.0.get(first)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }

    /// True when `path` resolves to a value
    pub fn contains(&self, path: &str) -> bool {
        self.get_path(path).is_some()
    }

    /// Set a top-level field, returning the previous value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Set a field at a dotted path, creating intermediate objects.
    ///
    /// A non-object value in the way is replaced by an object.
    pub fn set_path(&mut self, path: &str, value: Value) {
        let parts: Vec<&str> = path.split('.').collect();
        let (last, parents) = match parts.split_last() {
            Some(split) => split,
            None => return,
        };
        let mut map = &mut self.0;
        for part in parents {
            let entry = map
                .entry(part.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !matches!(entry, Value::Object(_)) {
                *entry = Value::Object(Map::new());
            }
            map = match entry {
                Value::Object(inner) => inner,
                _ => return,
            };
        }
        map.insert(last.to_string(), value);
    }

    /// Remove a top-level field
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.shift_remove(key)
    }

    /// Top-level field names, in insertion order
    pub fn keys(&self) -> Vec<String> {
        self.0.keys().cloned().collect()
    }

    /// Number of top-level fields
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when the document has no fields
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate top-level fields in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Document id rendered as a string (strings as-is, integers in decimal)
    pub fn id(&self, id_field: &str) -> Option<String> {
        match self.get_path(id_field)? {
            Value::String(s) => Some(s.clone()),
            Value::Int(i) => Some(i.to_string()),
            _ => None,
        }
    }

    /// Copy of this document with `outputs` merged into `_outputs`.
    ///
    /// Existing output entries with the same name are overwritten.
    pub fn with_outputs(&self, outputs: &Map) -> Document {
        let mut doc = self.clone();
        let slot = doc
            .0
            .entry(OUTPUTS_FIELD.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !matches!(slot, Value::Object(_)) {
            *slot = Value::Object(Map::new());
        }
        if let Value::Object(map) = slot {
            for (k, v) in outputs {
                map.insert(k.clone(), v.clone());
            }
        }
        doc
    }

    /// Copy of this document with `bindings` substituted into keys and values
    pub fn set_variables(&self, bindings: &Bindings) -> Document {
        match replace_variables(&Value::Object(self.0.clone()), bindings) {
            Value::Object(map) => Document(map),
            _ => self.clone(),
        }
    }

    /// Consume into the underlying map
    pub fn into_inner(self) -> Map {
        self.0
    }

    /// The document as an object value
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

impl From<Map> for Document {
    fn from(map: Map) -> Self {
        Document(map)
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Document(iter.into_iter().collect())
    }
}

impl Leaf for Document {
    fn variables(&self) -> Vec<String> {
        find_variables(&Value::Object(self.0.clone()))
    }

    fn with_variables(&self, bindings: &Bindings) -> LeafRef {
        Arc::new(self.set_variables(bindings))
    }

    fn to_value(&self) -> Value {
        Document::to_value(self)
    }
}
