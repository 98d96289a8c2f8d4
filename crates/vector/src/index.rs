//! Vector index
//!
//! A [`VectorIndex`] makes the outputs of its indexing listener searchable.
//! An optional compatible listener lets queries come from a different model
//! (e.g. text queries against image vectors) as long as both models produce
//! vectors of the same dimension.
//!
//! ## Query resolution
//!
//! For a query document, every `(model, key)` pair of the index is checked
//! in listener order; the **last** pair whose key fields are all present
//! wins. With no match, the pair keyed on `_base` is used; otherwise the
//! query fails with a key-resolution error. Queries carrying the id field
//! skip the model entirely and search from the stored vector.

use crate::error::{VectorError, VectorResult};
use crate::listener::Listener;
use crate::measure::Measure;
use crate::model::{embedding_from_value, Mapping, ModelRegistry};
use crate::searcher::{Nearest, SearcherRegistry};
use conflux_core::variables::{replace_in_str, variables_in_str};
use conflux_core::{Bindings, ConfluxError, Document, Identified, KeyType, Leaf, Map, Ref, Value};
use conflux_jobs::{CdcStatus, Job, JobKind, JobQueue};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Component type id of vector indexes.
pub const VECTOR_INDEX_TYPE_ID: &str = "vector_index";

/// Default number of neighbours returned.
pub const DEFAULT_N: usize = 100;

/// Default document id field.
pub const DEFAULT_ID_FIELD: &str = "_id";

/// Embedding computed for a query, with the pair that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedVector {
    /// The embedding
    pub vector: Vec<f32>,
    /// Identifier of the model that produced it
    pub model: String,
    /// Key the document was projected through
    pub key: KeyType,
}

/// Nearest-neighbour query against a vector index.
///
/// ```ignore
/// let query = NearestQuery::new(doc).with_n(10).with_ids(candidate_ids);
/// let nearest = index.get_nearest(&query, &searchers, &models)?;
/// ```
#[derive(Debug, Clone)]
pub struct NearestQuery {
    /// Query document
    pub like: Document,
    /// Restrict results to these ids; empty means unrestricted
    pub within_ids: Vec<String>,
    /// Maximum number of results
    pub n: usize,
    /// Extra outputs merged under `_outputs` before resolution
    pub outputs: Option<Map>,
    /// Field that, when present, identifies an already indexed document
    pub id_field: String,
}

impl NearestQuery {
    /// Query by example document
    pub fn new(like: Document) -> Self {
        Self {
            like,
            within_ids: Vec::new(),
            n: DEFAULT_N,
            outputs: None,
            id_field: DEFAULT_ID_FIELD.to_string(),
        }
    }

    /// Restrict to candidate ids
    pub fn with_ids(mut self, ids: Vec<String>) -> Self {
        self.within_ids = ids;
        self
    }

    /// Set the result limit
    pub fn with_n(mut self, n: usize) -> Self {
        self.n = n;
        self
    }

    /// Seed `_outputs`
    pub fn with_outputs(mut self, outputs: Map) -> Self {
        self.outputs = Some(outputs);
        self
    }

    /// Use a different id field
    pub fn with_id_field(mut self, id_field: impl Into<String>) -> Self {
        self.id_field = id_field.into();
        self
    }
}

/// Searchable projection of a listener's outputs.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    /// Index identifier; also the searcher key
    pub identifier: String,
    /// Listener whose outputs are indexed
    pub indexing_listener: Ref<Listener>,
    /// Listener whose model may produce query vectors
    pub compatible_listener: Option<Ref<Listener>>,
    /// Similarity measure
    pub measure: Measure,
    /// Free-form metric values recorded against the index
    pub metric_values: BTreeMap<String, Value>,
}

impl VectorIndex {
    /// Index over `indexing_listener`, cosine measure
    pub fn new(identifier: impl Into<String>, indexing_listener: Ref<Listener>) -> Self {
        Self {
            identifier: identifier.into(),
            indexing_listener,
            compatible_listener: None,
            measure: Measure::default(),
            metric_values: BTreeMap::new(),
        }
    }

    /// Add a compatible listener
    pub fn with_compatible_listener(mut self, listener: Ref<Listener>) -> Self {
        self.compatible_listener = Some(listener);
        self
    }

    /// Set the measure
    pub fn with_measure(mut self, measure: Measure) -> Self {
        self.measure = measure;
        self
    }

    /// Copy with `bindings` substituted into the identifier and listener references
    pub fn set_variables(&self, bindings: &Bindings) -> VectorIndex {
        let identifier = match replace_in_str(&self.identifier, bindings) {
            Value::String(s) => s,
            _ => self.identifier.clone(),
        };
        VectorIndex {
            identifier,
            indexing_listener: listener_with_variables(&self.indexing_listener, bindings),
            compatible_listener: self
                .compatible_listener
                .as_ref()
                .map(|l| listener_with_variables(l, bindings)),
            measure: self.measure,
            metric_values: self.metric_values.clone(),
        }
    }

    /// Variables named by the identifier and listeners
    pub fn variables(&self) -> Vec<String> {
        let mut out = variables_in_str(&self.identifier);
        for listener in [Some(&self.indexing_listener), self.compatible_listener.as_ref()]
            .into_iter()
            .flatten()
        {
            let found = match listener {
                Ref::Unresolved(id) => variables_in_str(id),
                Ref::Resolved(l) => l.variables(),
            };
            for name in found {
                if !out.contains(&name) {
                    out.push(name);
                }
            }
        }
        out
    }

    /// Resolve listener references by identifier. Resolved references are left alone.
    pub fn on_load<F>(&mut self, mut load: F) -> VectorResult<()>
    where
        F: FnMut(&str) -> VectorResult<Arc<Listener>>,
    {
        resolve_listener(&mut self.indexing_listener, &mut load)?;
        if let Some(compatible) = self.compatible_listener.as_mut() {
            resolve_listener(compatible, &mut load)?;
        }
        Ok(())
    }

    /// Indexing listener, then the compatible listener if any
    pub fn listeners(&self) -> VectorResult<Vec<&Arc<Listener>>> {
        let mut out = vec![self.indexing_listener.resolved()?];
        if let Some(compatible) = &self.compatible_listener {
            out.push(compatible.resolved()?);
        }
        Ok(out)
    }

    /// Model identifiers and keys of the listeners, in listener order
    pub fn models_keys(&self) -> VectorResult<(Vec<String>, Vec<KeyType>)> {
        let listeners = self.listeners()?;
        let models = listeners
            .iter()
            .map(|l| l.model.identifier().to_string())
            .collect();
        let keys = listeners.iter().map(|l| l.key.clone()).collect();
        Ok((models, keys))
    }

    /// Compute the embedding of `like` with the last `(model, key)` pair whose key matches.
    ///
    /// Keys are matched against the top-level fields of `like` (after
    /// `outputs` is merged under `_outputs`); nested paths never match.
    pub fn get_vector(
        &self,
        like: &Document,
        models: &[String],
        keys: &[KeyType],
        registry: &ModelRegistry,
        outputs: Option<&Map>,
    ) -> VectorResult<ResolvedVector> {
        let document = match outputs {
            Some(extra) => like.with_outputs(extra),
            None => like.clone(),
        };

        let mut chosen: Option<(&String, &KeyType)> = None;
        for (model, key) in models.iter().zip(keys) {
            if key.matches_top_level(&document) {
                chosen = Some((model, key));
            }
        }

        let (model_name, key) = match chosen {
            Some(pair) => pair,
            None => models
                .iter()
                .zip(keys)
                .find(|(_, k)| k.is_base())
                .ok_or_else(|| ConfluxError::KeyResolution {
                    keys: like.keys(),
                    models_keys: keys.iter().map(|k| k.to_string()).collect(),
                    models: models.to_vec(),
                })?,
        };

        let model = registry.get(model_name)?;
        let signature = model.signature();
        let data = Mapping::new(key, signature).apply(&document)?;
        let inputs = model.handle_input_type(data, signature)?;
        let output = model.predict_one(&inputs.args, &inputs.kwargs)?;
        debug!(index = %self.identifier, model = %model_name, key = %key, "Computed query vector");

        Ok(ResolvedVector {
            vector: embedding_from_value(&output)?,
            model: model.identifier().to_string(),
            key: key.clone(),
        })
    }

    /// Nearest indexed documents to `query`.
    ///
    /// A query document carrying the id field is answered from the stored
    /// vector of that id; no model is invoked.
    pub fn get_nearest(
        &self,
        query: &NearestQuery,
        searchers: &SearcherRegistry,
        registry: &ModelRegistry,
    ) -> VectorResult<Nearest> {
        let (models, keys) = self.models_keys()?;
        if models.len() != keys.len() {
            return Err(ConfluxError::Invariant(format!(
                "len(models={:?}) != len(keys={:?})",
                models, keys
            ))
            .into());
        }

        if let Some(id) = query.like.get(&query.id_field) {
            let id = render_id(id);
            debug!(index = %self.identifier, id = %id, "Nearest search from stored vector");
            return searchers
                .get(&self.identifier)?
                .find_nearest_from_id(&id, &query.within_ids, query.n);
        }

        let resolved = self.get_vector(
            &query.like,
            &models,
            &keys,
            registry,
            query.outputs.as_ref(),
        )?;
        searchers
            .get(&self.identifier)?
            .find_nearest_from_array(&resolved.vector, &query.within_ids, query.n)
    }

    /// Vector dimension: last element of the indexing model's output shape
    pub fn dimensions(&self) -> VectorResult<usize> {
        listener_dimensions(self.indexing_listener.resolved()?)?
            .ok_or_else(|| VectorError::MissingShape(self.indexing_listener.identifier().to_string()))
    }

    /// Check that a compatible listener produces vectors of the indexed dimension.
    ///
    /// A compatible model without a declared datatype is accepted.
    pub fn validate_dimensions(&self) -> VectorResult<()> {
        let expected = self.dimensions()?;
        if let Some(compatible) = &self.compatible_listener {
            if let Some(got) = listener_dimensions(compatible.resolved()?)? {
                if got != expected {
                    return Err(VectorError::DimensionMismatch { expected, got });
                }
            }
        }
        Ok(())
    }

    /// The job copying every indexing-listener output into the searcher
    pub fn copy_vectors_job(&self) -> VectorResult<Job> {
        let listener = self.indexing_listener.resolved()?;
        Ok(Job::new(JobKind::CopyVectors {
            vector_index: self.identifier.clone(),
            ids: Vec::new(),
            query: listener.select.encode(),
        }))
    }

    /// Schedule the initial vector copy after `dependencies`.
    ///
    /// Returns the submitted job id, or nothing when CDC is running (the
    /// CDC service keeps the searcher in sync itself).
    pub fn schedule_jobs(
        &self,
        cdc: &dyn CdcStatus,
        queue: &dyn JobQueue,
        dependencies: &[String],
    ) -> VectorResult<Vec<String>> {
        if cdc.is_running() {
            debug!(index = %self.identifier, "CDC running, skipping copy_vectors");
            return Ok(Vec::new());
        }
        let job = self.copy_vectors_job()?;
        let id = queue.submit(job, dependencies)?;
        info!(index = %self.identifier, job = %id, "Scheduled copy_vectors");
        Ok(vec![id])
    }
}

impl Identified for VectorIndex {
    fn identifier(&self) -> &str {
        &self.identifier
    }
}

fn resolve_listener<F>(reference: &mut Ref<Listener>, load: &mut F) -> VectorResult<()>
where
    F: FnMut(&str) -> VectorResult<Arc<Listener>>,
{
    if let Ref::Unresolved(id) = reference {
        let listener = load(id.as_str())?;
        *reference = Ref::Resolved(listener);
    }
    Ok(())
}

fn listener_with_variables(reference: &Ref<Listener>, bindings: &Bindings) -> Ref<Listener> {
    match reference {
        Ref::Unresolved(id) => match replace_in_str(id, bindings) {
            Value::String(s) => Ref::Unresolved(s),
            _ => Ref::Unresolved(id.clone()),
        },
        Ref::Resolved(listener) => Ref::Resolved(Arc::new(listener.set_variables(bindings))),
    }
}

fn listener_dimensions(listener: &Listener) -> VectorResult<Option<usize>> {
    let model = listener.model.resolved()?;
    Ok(model.datatype().and_then(|dt| dt.dimensions()))
}

fn render_id(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Int(i) => i.to_string(),
        other => other.to_json().to_string(),
    }
}
