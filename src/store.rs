//! Document storage.
//!
//! The data layer reads and writes documents through [`DocumentStore`].
//! [`InMemoryStore`] keeps every table in memory, ordered by id, which makes
//! scans deterministic.
//!
//! # Example
//!
//! ```ignore
//! let store = InMemoryStore::new("_id");
//! let ids = store.insert("docs", vec![doc])?;
//! let matching = store.select(&Select::table("docs"), &[])?;
//! ```

use crate::error::{Error, Result};
use conflux_core::{new_uuid, Document, Map, Value};
use conflux_vector::Select;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Table-oriented document storage.
pub trait DocumentStore: Send + Sync {
    /// Insert documents, assigning ids where missing. Returns the ids in input order.
    ///
    /// The batch is rejected as a whole when any id already exists.
    fn insert(&self, table: &str, docs: Vec<Document>) -> Result<Vec<String>>;

    /// Merge `patch` into each existing document. Returns the ids updated.
    fn update(&self, table: &str, ids: &[String], patch: &Document) -> Result<Vec<String>>;

    /// Remove documents. Returns the ids that existed.
    fn delete(&self, table: &str, ids: &[String]) -> Result<Vec<String>>;

    /// Fetch one document.
    fn get(&self, table: &str, id: &str) -> Result<Option<Document>>;

    /// Documents matching `select`, restricted to `ids` unless empty.
    ///
    /// With `ids` the result follows their order; otherwise id order.
    fn select(&self, select: &Select, ids: &[String]) -> Result<Vec<Document>>;

    /// Store a model output under `_outputs.<name>` of one document.
    fn set_output(&self, table: &str, id: &str, name: &str, value: Value) -> Result<()>;

    /// Number of documents in `table`
    fn count(&self, table: &str) -> usize;

    /// Table names, sorted
    fn tables(&self) -> Vec<String>;
}

/// In-memory [`DocumentStore`].
#[derive(Debug)]
pub struct InMemoryStore {
    id_field: String,
    tables: RwLock<BTreeMap<String, BTreeMap<String, Document>>>,
}

impl InMemoryStore {
    /// Empty store keyed on `id_field`
    pub fn new(id_field: impl Into<String>) -> Self {
        Self {
            id_field: id_field.into(),
            tables: RwLock::new(BTreeMap::new()),
        }
    }

    /// Field holding document ids
    pub fn id_field(&self) -> &str {
        &self.id_field
    }
}

impl DocumentStore for InMemoryStore {
    fn insert(&self, table: &str, docs: Vec<Document>) -> Result<Vec<String>> {
        let mut prepared = Vec::with_capacity(docs.len());
        for mut doc in docs {
            let id = if doc.contains(&self.id_field) {
                doc.id(&self.id_field).ok_or_else(|| {
                    Error::InvalidInput(format!(
                        "field {} must be a string or integer",
                        self.id_field
                    ))
                })?
            } else {
                let id = new_uuid();
                doc.insert(self.id_field.clone(), id.as_str());
                id
            };
            prepared.push((id, doc));
        }

        let mut tables = self.tables.write();
        let rows = tables.entry(table.to_string()).or_default();
        let mut seen = BTreeSet::new();
        for (id, _) in &prepared {
            if rows.contains_key(id) || !seen.insert(id.as_str()) {
                return Err(Error::InvalidInput(format!(
                    "duplicate id {} in table {}",
                    id, table
                )));
            }
        }

        let ids: Vec<String> = prepared.iter().map(|(id, _)| id.clone()).collect();
        for (id, doc) in prepared {
            rows.insert(id, doc);
        }
        debug!(table, count = ids.len(), "Inserted documents");
        Ok(ids)
    }

    fn update(&self, table: &str, ids: &[String], patch: &Document) -> Result<Vec<String>> {
        if patch.contains(&self.id_field) {
            return Err(Error::InvalidInput(format!(
                "field {} cannot be updated",
                self.id_field
            )));
        }
        let mut tables = self.tables.write();
        let Some(rows) = tables.get_mut(table) else {
            return Ok(Vec::new());
        };
        let mut updated = Vec::new();
        for id in ids {
            if let Some(doc) = rows.get_mut(id) {
                for (field, value) in patch.iter() {
                    doc.insert(field.clone(), value.clone());
                }
                updated.push(id.clone());
            }
        }
        debug!(table, count = updated.len(), "Updated documents");
        Ok(updated)
    }

    fn delete(&self, table: &str, ids: &[String]) -> Result<Vec<String>> {
        let mut tables = self.tables.write();
        let Some(rows) = tables.get_mut(table) else {
            return Ok(Vec::new());
        };
        let deleted: Vec<String> = ids
            .iter()
            .filter(|id| rows.remove(id.as_str()).is_some())
            .cloned()
            .collect();
        debug!(table, count = deleted.len(), "Deleted documents");
        Ok(deleted)
    }

    fn get(&self, table: &str, id: &str) -> Result<Option<Document>> {
        Ok(self
            .tables
            .read()
            .get(table)
            .and_then(|rows| rows.get(id))
            .cloned())
    }

    fn select(&self, select: &Select, ids: &[String]) -> Result<Vec<Document>> {
        let tables = self.tables.read();
        let Some(rows) = tables.get(&select.table) else {
            return Ok(Vec::new());
        };
        let docs = if ids.is_empty() {
            rows.values()
                .filter(|doc| select.matches(doc))
                .cloned()
                .collect()
        } else {
            ids.iter()
                .filter_map(|id| rows.get(id))
                .filter(|doc| select.matches(doc))
                .cloned()
                .collect()
        };
        Ok(docs)
    }

    fn set_output(&self, table: &str, id: &str, name: &str, value: Value) -> Result<()> {
        let mut tables = self.tables.write();
        let doc = tables
            .get_mut(table)
            .and_then(|rows| rows.get_mut(id))
            .ok_or_else(|| Error::NotFound(format!("document {} in table {}", id, table)))?;
        let mut outputs = Map::new();
        outputs.insert(name.to_string(), value);
        *doc = doc.with_outputs(&outputs);
        Ok(())
    }

    fn count(&self, table: &str) -> usize {
        self.tables.read().get(table).map(|rows| rows.len()).unwrap_or(0)
    }

    fn tables(&self) -> Vec<String> {
        self.tables.read().keys().cloned().collect()
    }
}
