//! Listener input keys
//!
//! A listener reads its model inputs from a document through a [`KeyType`]:
//! one field, an ordered list of fields, or a mapping from model argument
//! name to field.

use crate::document::Document;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Key meaning "the whole document".
pub const BASE_KEY: &str = "_base";

/// Fields a listener consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyType {
    /// One field, passed as the single positional argument
    Single(String),
    /// Several fields, passed positionally in order
    Many(Vec<String>),
    /// Argument name to field
    Mapping(BTreeMap<String, String>),
}

impl KeyType {
    /// True when every field this key needs resolves in `doc`, following
    /// dotted paths.
    ///
    /// An empty list or mapping never matches.
    pub fn matches(&self, doc: &Document) -> bool {
        self.all_present(|field| doc.contains(field))
    }

    /// True when every field this key needs is a top-level field of `doc`.
    ///
    /// Dotted keys are compared as plain field names, so `meta.text` does
    /// not match a nested `{"meta": {"text": ..}}`.
    pub fn matches_top_level(&self, doc: &Document) -> bool {
        self.all_present(|field| doc.get(field).is_some())
    }

    fn all_present(&self, present: impl Fn(&str) -> bool) -> bool {
        match self {
            KeyType::Single(field) => present(field),
            KeyType::Many(fields) => !fields.is_empty() && fields.iter().all(|f| present(f)),
            KeyType::Mapping(map) => !map.is_empty() && map.values().all(|f| present(f)),
        }
    }

    /// True for the `_base` whole-document key
    pub fn is_base(&self) -> bool {
        matches!(self, KeyType::Single(k) if k == BASE_KEY)
    }

    /// Fields read by this key, in argument order
    pub fn fields(&self) -> Vec<String> {
        match self {
            KeyType::Single(f) => vec![f.clone()],
            KeyType::Many(fs) => fs.clone(),
            KeyType::Mapping(m) => m.values().cloned().collect(),
        }
    }

    /// Value view used in job arguments and variable resolution
    pub fn to_value(&self) -> Value {
        match self {
            KeyType::Single(f) => Value::String(f.clone()),
            KeyType::Many(fs) => Value::Array(fs.iter().map(|f| Value::from(f.as_str())).collect()),
            KeyType::Mapping(m) => Value::Object(
                m.iter()
                    .map(|(k, v)| (k.clone(), Value::from(v.as_str())))
                    .collect(),
            ),
        }
    }

    /// Rebuild from a value; anything that is not a string, list of strings
    /// or string mapping yields `None`.
    pub fn from_value(value: &Value) -> Option<KeyType> {
        match value {
            Value::String(s) => Some(KeyType::Single(s.clone())),
            Value::Array(items) => items
                .iter()
                .map(|v| v.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .map(KeyType::Many),
            Value::Object(map) => map
                .iter()
                .map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect::<Option<BTreeMap<_, _>>>()
                .map(KeyType::Mapping),
            _ => None,
        }
    }
}

impl From<&str> for KeyType {
    fn from(s: &str) -> Self {
        KeyType::Single(s.to_string())
    }
}

impl From<Vec<&str>> for KeyType {
    fn from(v: Vec<&str>) -> Self {
        KeyType::Many(v.into_iter().map(str::to_string).collect())
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyType::Single(k) => write!(f, "{}", k),
            KeyType::Many(ks) => write!(f, "[{}]", ks.join(", ")),
            KeyType::Mapping(m) => {
                let parts: Vec<String> = m.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
        }
    }
}
