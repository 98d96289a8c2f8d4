//! Main entry point for Conflux.
//!
//! This module provides the [`Datalayer`] struct, which ties documents,
//! models, listeners and vector indexes together.

use crate::component::{Component, MODEL_TYPE_ID};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::store::{DocumentStore, InMemoryStore};
use crate::tasks;
use conflux_core::{
    Bindings, ComponentRef, ConfluxError, Document, Event, EventType, Ref, FOLD_FIELD,
};
use conflux_jobs::{
    CdcFlag, CdcStatus, EventQueue, Job, JobError, JobKind, JobQueue, LocalJobQueue, RunSummary,
};
use conflux_vector::{
    Listener, Model, ModelRegistry, Nearest, NearestQuery, SearcherKind, SearcherRegistry,
    VectorIndex, LISTENER_TYPE_ID, VECTOR_INDEX_TYPE_ID,
};
use parking_lot::RwLock;
use rand::Rng;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// The Conflux data layer.
///
/// Create one with [`Datalayer::new`] or [`Datalayer::builder`].
///
/// # Example
///
/// ```ignore
/// use confluxdb::prelude::*;
///
/// let db = Datalayer::new()?;
/// db.apply(model)?;
/// db.apply(Listener::new("embed", "encoder", "text", Select::table("docs")))?;
/// db.apply(VectorIndex::new("docs-idx", Ref::by_id("embed")))?;
///
/// db.insert("docs", vec![Document::from_json(json!({"text": "hello"}))])?;
/// db.process_events()?;
/// db.run_jobs()?;
///
/// let query = db.nearest_query(Document::from_json(json!({"text": "hi"})));
/// let nearest = db.select_nearest("docs-idx", &query)?;
/// ```
pub struct Datalayer {
    config: Config,
    store: Arc<dyn DocumentStore>,
    models: ModelRegistry,
    listeners: RwLock<BTreeMap<String, Arc<Listener>>>,
    vector_indexes: RwLock<BTreeMap<String, Arc<VectorIndex>>>,
    searchers: SearcherRegistry,
    cdc: CdcFlag,
    jobs: LocalJobQueue,
    events: EventQueue,
}

impl Datalayer {
    /// Data layer with default settings and an in-memory store.
    pub fn new() -> Result<Self> {
        DatalayerBuilder::new().build()
    }

    /// Data layer configured from a TOML file.
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self> {
        DatalayerBuilder::new().config(Config::load(path)?).build()
    }

    /// Create a builder for custom configuration.
    pub fn builder() -> DatalayerBuilder {
        DatalayerBuilder::new()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Document store
    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    /// Registered models
    pub fn models(&self) -> &ModelRegistry {
        &self.models
    }

    /// One searcher per vector index
    pub fn searchers(&self) -> &SearcherRegistry {
        &self.searchers
    }

    /// CDC status flag
    pub fn cdc(&self) -> &CdcFlag {
        &self.cdc
    }

    /// Job queue
    pub fn jobs(&self) -> &LocalJobQueue {
        &self.jobs
    }

    /// Events published but not yet processed
    pub fn events(&self) -> &EventQueue {
        &self.events
    }

    /// Snapshot of component and queue counts
    pub fn stats(&self) -> DatalayerStats {
        DatalayerStats {
            models: self.models.identifiers().len(),
            listeners: self.listeners.read().len(),
            vector_indexes: self.vector_indexes.read().len(),
            pending_events: self.events.len(),
            pending_jobs: self.jobs.pending_count(),
        }
    }

    // =========================================================================
    // Components
    // =========================================================================

    /// Apply a component and schedule its initial jobs.
    ///
    /// - Models are registered.
    /// - Listeners resolve their model and schedule a run over their select.
    /// - Vector indexes resolve their listeners, get a searcher sized to the
    ///   indexing model's output, and schedule a vector copy after the
    ///   indexing listener's pending run (unless CDC is running).
    ///
    /// Listeners embedded in a vector index are applied first. Returns the
    /// ids of every job scheduled.
    ///
    /// # Errors
    ///
    /// `InvalidInput` when the component still has unbound `<var:...>`
    /// placeholders; `NotFound` when a referenced component is missing.
    pub fn apply(&self, component: impl Into<Component>) -> Result<Vec<String>> {
        let component = component.into();
        let unbound = component.variables();
        if !unbound.is_empty() {
            return Err(Error::InvalidInput(format!(
                "{} {} has unbound variables {:?}",
                component.type_id(),
                component.identifier(),
                unbound
            )));
        }
        match component {
            Component::Model(model) => {
                self.apply_model(model);
                Ok(Vec::new())
            }
            Component::Listener(listener) => self.apply_listener(listener),
            Component::VectorIndex(index) => self.apply_vector_index(index),
        }
    }

    /// Bind variables, then [`apply`](Self::apply).
    pub fn apply_with(
        &self,
        component: impl Into<Component>,
        bindings: &Bindings,
    ) -> Result<Vec<String>> {
        self.apply(component.into().set_variables(bindings))
    }

    fn apply_model(&self, model: Arc<dyn Model>) {
        let identifier = model.identifier().to_string();
        self.models.insert(model);
        self.publish_apply(MODEL_TYPE_ID, &identifier);
        info!(model = %identifier, "Applied model");
    }

    fn apply_listener(&self, mut listener: Listener) -> Result<Vec<String>> {
        if let Ref::Resolved(model) = &listener.model {
            if !self.models.contains(model.identifier()) {
                self.apply_model(Arc::clone(model));
            }
        }
        listener.model.resolve_with(|id| {
            self.models
                .get(id)
                .map_err(|_| ConfluxError::not_found(format!("model {}", id)))
        })?;

        let identifier = listener.identifier.clone();
        self.listeners
            .write()
            .insert(identifier.clone(), Arc::new(listener));
        self.publish_apply(LISTENER_TYPE_ID, &identifier);

        let job = Job::new(JobKind::RunListener {
            listener: identifier.clone(),
            ids: Vec::new(),
        });
        let job_id = self.jobs.submit(job, &[])?;
        info!(listener = %identifier, job = %job_id, "Applied listener");
        Ok(vec![job_id])
    }

    fn apply_vector_index(&self, mut index: VectorIndex) -> Result<Vec<String>> {
        let mut scheduled = Vec::new();
        scheduled.extend(self.apply_embedded_listener(&mut index.indexing_listener)?);
        if let Some(compatible) = index.compatible_listener.as_mut() {
            scheduled.extend(self.apply_embedded_listener(compatible)?);
        }

        index.on_load(|id| {
            self.listener(id)
                .ok_or_else(|| ConfluxError::not_found(format!("listener {}", id)).into())
        })?;
        index.validate_dimensions()?;

        let dimension = index.dimensions()?;
        self.searchers.insert(
            index.identifier.clone(),
            self.config.searcher.kind.create(dimension, index.measure),
        );

        let dependencies = self.pending_listener_jobs(index.indexing_listener.identifier());
        let jobs = index.schedule_jobs(&self.cdc, &self.jobs, &dependencies)?;
        scheduled.extend(jobs);

        let identifier = index.identifier.clone();
        self.vector_indexes
            .write()
            .insert(identifier.clone(), Arc::new(index));
        self.publish_apply(VECTOR_INDEX_TYPE_ID, &identifier);
        info!(
            index = %identifier,
            dimension,
            jobs = scheduled.len(),
            "Applied vector index"
        );
        Ok(scheduled)
    }

    /// Apply a listener carried inside another component if it is not
    /// registered yet, leaving the reference to be loaded by identifier.
    fn apply_embedded_listener(&self, reference: &mut Ref<Listener>) -> Result<Vec<String>> {
        let Ref::Resolved(listener) = reference else {
            return Ok(Vec::new());
        };
        let identifier = listener.identifier.clone();
        let jobs = if self.listener(&identifier).is_none() {
            self.apply_listener(Listener::clone(listener))?
        } else {
            Vec::new()
        };
        *reference = Ref::by_id(identifier);
        Ok(jobs)
    }

    fn pending_listener_jobs(&self, listener_id: &str) -> Vec<String> {
        self.jobs
            .jobs()
            .into_iter()
            .filter(|job| !job.is_finished())
            .filter(|job| {
                matches!(&job.kind, JobKind::RunListener { listener, .. } if listener == listener_id)
            })
            .map(|job| job.id)
            .collect()
    }

    fn listener(&self, identifier: &str) -> Option<Arc<Listener>> {
        self.listeners.read().get(identifier).cloned()
    }

    /// Load a registered model
    pub fn load_model(&self, identifier: &str) -> Result<Arc<dyn Model>> {
        Ok(self.models.get(identifier)?)
    }

    /// Load a registered listener
    pub fn load_listener(&self, identifier: &str) -> Result<Arc<Listener>> {
        self.listener(identifier)
            .ok_or_else(|| Error::NotFound(format!("listener {}", identifier)))
    }

    /// Load a registered vector index
    pub fn load_vector_index(&self, identifier: &str) -> Result<Arc<VectorIndex>> {
        self.vector_indexes
            .read()
            .get(identifier)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("vector_index {}", identifier)))
    }

    /// Identifiers of every component of `type_id`, sorted.
    pub fn show(&self, type_id: &str) -> Result<Vec<String>> {
        let mut ids = match type_id {
            MODEL_TYPE_ID => self.models.identifiers(),
            LISTENER_TYPE_ID => self.listeners.read().keys().cloned().collect(),
            VECTOR_INDEX_TYPE_ID => self.vector_indexes.read().keys().cloned().collect(),
            other => {
                return Err(Error::InvalidInput(format!(
                    "unknown component type {}",
                    other
                )))
            }
        };
        ids.sort();
        Ok(ids)
    }

    // =========================================================================
    // Documents
    // =========================================================================

    /// Insert documents into `table`.
    ///
    /// Each document without a `_fold` is assigned `valid` with probability
    /// `fold_probability`, else `train`. Publishes one insert event per id
    /// to every consuming component. Returns the ids in input order.
    pub fn insert(&self, table: &str, docs: Vec<Document>) -> Result<Vec<String>> {
        let probability = self.config.fold_probability;
        let mut rng = rand::thread_rng();
        let docs = docs
            .into_iter()
            .map(|mut doc| {
                if !doc.contains(FOLD_FIELD) {
                    let fold = if rng.gen::<f64>() >= probability {
                        "train"
                    } else {
                        "valid"
                    };
                    doc.insert(FOLD_FIELD, fold);
                }
                doc
            })
            .collect();

        let ids = self.store.insert(table, docs)?;
        info!(table, count = ids.len(), "Inserted documents");
        self.on_event(table, &ids, EventType::Insert)?;
        Ok(ids)
    }

    /// Merge `patch` into the documents `ids` of `table`. Returns the ids updated.
    pub fn update(&self, table: &str, ids: &[String], patch: &Document) -> Result<Vec<String>> {
        let updated = self.store.update(table, ids, patch)?;
        info!(table, count = updated.len(), "Updated documents");
        self.on_event(table, &updated, EventType::Update)?;
        Ok(updated)
    }

    /// Delete the documents `ids` of `table`. Returns the ids that existed.
    pub fn delete(&self, table: &str, ids: &[String]) -> Result<Vec<String>> {
        let deleted = self.store.delete(table, ids)?;
        info!(table, count = deleted.len(), "Deleted documents");
        self.on_event(table, &deleted, EventType::Delete)?;
        Ok(deleted)
    }

    /// Publish one event per id to every component consuming `table`.
    ///
    /// Listeners consume inserts and updates; vector indexes consume all
    /// mutations of their indexing listener's table. Returns the number of
    /// events published.
    pub fn on_event(&self, table: &str, ids: &[String], event_type: EventType) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut destinations = Vec::new();
        if event_type != EventType::Delete {
            for listener in self.listeners.read().values() {
                if listener.select.table == table {
                    destinations.push(ComponentRef::new(LISTENER_TYPE_ID, &listener.identifier));
                }
            }
        }
        for index in self.vector_indexes.read().values() {
            if index.indexing_listener.resolved()?.select.table == table {
                destinations.push(ComponentRef::new(VECTOR_INDEX_TYPE_ID, &index.identifier));
            }
        }

        let events: Vec<Event> = destinations
            .iter()
            .flat_map(|dest| {
                ids.iter()
                    .map(move |id| Event::new(event_type, dest.clone(), vec![id.clone()]))
            })
            .collect();
        debug!(
            table,
            event_type = %event_type,
            destinations = destinations.len(),
            "Routing events"
        );
        Ok(self.events.publish(events))
    }

    // =========================================================================
    // Jobs
    // =========================================================================

    /// Turn buffered events into jobs.
    ///
    /// Events are merged per destination and type first. Listener jobs are
    /// submitted before vector-index jobs, and a vector copy depends on the
    /// jobs of its indexing listener from the same batch. With CDC running
    /// vector-index events are left to the CDC service. Returns the
    /// submitted job ids.
    pub fn process_events(&self) -> Result<Vec<String>> {
        let batches = self.events.drain()?;
        let mut submitted = Vec::new();
        let mut listener_jobs: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for batch in batches.iter().filter(|b| b.dest.type_id == LISTENER_TYPE_ID) {
            for (event_type, event) in batch.events.iter() {
                match event_type {
                    EventType::Insert | EventType::Update => {
                        let job = Job::with_id(
                            event.uuid.clone(),
                            JobKind::RunListener {
                                listener: batch.dest.identifier.clone(),
                                ids: event.ids().to_vec(),
                            },
                        );
                        let id = self.jobs.submit(job, &[])?;
                        listener_jobs
                            .entry(batch.dest.identifier.clone())
                            .or_default()
                            .push(id.clone());
                        submitted.push(id);
                    }
                    other => debug!(dest = %batch.dest, event_type = %other, "No job for event"),
                }
            }
        }

        for batch in batches
            .iter()
            .filter(|b| b.dest.type_id == VECTOR_INDEX_TYPE_ID)
        {
            if self.cdc.is_running() {
                debug!(dest = %batch.dest, "CDC running, leaving vector events to CDC");
                continue;
            }
            let index = self.load_vector_index(&batch.dest.identifier)?;
            let listener = index.indexing_listener.resolved()?;
            let dependencies = listener_jobs
                .get(&listener.identifier)
                .cloned()
                .unwrap_or_default();

            for (event_type, event) in batch.events.iter() {
                let (kind, deps) = match event_type {
                    EventType::Insert | EventType::Update => (
                        JobKind::CopyVectors {
                            vector_index: index.identifier.clone(),
                            ids: event.ids().to_vec(),
                            query: listener.select.encode(),
                        },
                        dependencies.as_slice(),
                    ),
                    EventType::Delete => (
                        JobKind::DeleteVectors {
                            vector_index: index.identifier.clone(),
                            ids: event.ids().to_vec(),
                        },
                        &[][..],
                    ),
                    EventType::Apply => {
                        debug!(dest = %batch.dest, "No job for apply event");
                        continue;
                    }
                };
                submitted.push(self.jobs.submit(Job::with_id(event.uuid.clone(), kind), deps)?);
            }
        }

        info!(
            batches = batches.len(),
            jobs = submitted.len(),
            "Processed events"
        );
        Ok(submitted)
    }

    /// Run every pending job in dependency order.
    pub fn run_jobs(&self) -> Result<RunSummary> {
        let handler = |job: &Job| -> conflux_jobs::Result<()> {
            self.execute(job)
                .map_err(|e| JobError::Handler(e.to_string()))
        };
        let summary = self.jobs.run_all(&handler)?;
        info!(
            succeeded = summary.succeeded.len(),
            failed = summary.failed.len(),
            "Ran jobs"
        );
        Ok(summary)
    }

    /// Execute one job's task directly.
    pub fn execute(&self, job: &Job) -> Result<()> {
        debug!(job = %job.id, task = job.kind.name(), "Executing job");
        match &job.kind {
            JobKind::RunListener { listener, ids } => {
                tasks::run_listener(self, listener, ids)?;
            }
            JobKind::CopyVectors {
                vector_index,
                ids,
                query,
            } => {
                tasks::copy_vectors(self, vector_index, ids, query)?;
            }
            JobKind::DeleteVectors { vector_index, ids } => {
                tasks::delete_vectors(self, vector_index, ids)?;
            }
        }
        Ok(())
    }

    // =========================================================================
    // Search
    // =========================================================================

    /// Nearest query seeded with the configured id field and result limit.
    pub fn nearest_query(&self, like: Document) -> NearestQuery {
        NearestQuery::new(like)
            .with_n(self.config.default_n)
            .with_id_field(self.config.id_field.as_str())
    }

    /// Nearest documents to `query` in `vector_index`.
    ///
    /// Scores are descending; ties are broken by id.
    pub fn select_nearest(&self, vector_index: &str, query: &NearestQuery) -> Result<Nearest> {
        let index = self.load_vector_index(vector_index)?;
        let nearest = index.get_nearest(query, &self.searchers, &self.models)?;
        debug!(index = %vector_index, results = nearest.len(), "Nearest search");
        Ok(nearest)
    }

    fn publish_apply(&self, type_id: &str, identifier: &str) {
        self.events
            .publish(vec![Event::apply(ComponentRef::new(type_id, identifier))]);
    }
}

/// Snapshot of data-layer counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatalayerStats {
    /// Registered models
    pub models: usize,
    /// Registered listeners
    pub listeners: usize,
    /// Registered vector indexes
    pub vector_indexes: usize,
    /// Events waiting for [`Datalayer::process_events`]
    pub pending_events: usize,
    /// Jobs waiting for [`Datalayer::run_jobs`]
    pub pending_jobs: usize,
}

/// Builder for data-layer configuration.
///
/// # Example
///
/// ```ignore
/// let db = Datalayer::builder()
///     .cdc_running(false)
///     .fold_probability(0.1)
///     .default_n(10)
///     .build()?;
/// ```
pub struct DatalayerBuilder {
    config: Config,
    store: Option<Arc<dyn DocumentStore>>,
}

impl DatalayerBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            store: None,
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Set the document id field.
    pub fn id_field(mut self, id_field: impl Into<String>) -> Self {
        self.config.id_field = id_field.into();
        self
    }

    /// Set the default nearest-search limit.
    pub fn default_n(mut self, n: usize) -> Self {
        self.config.default_n = n;
        self
    }

    /// Set the chance of assigning the `valid` fold on insert.
    pub fn fold_probability(mut self, probability: f64) -> Self {
        self.config.fold_probability = probability;
        self
    }

    /// Set whether a CDC service is running.
    pub fn cdc_running(mut self, running: bool) -> Self {
        self.config.cdc.running = running;
        self
    }

    /// Set the searcher implementation.
    pub fn searcher_kind(mut self, kind: SearcherKind) -> Self {
        self.config.searcher.kind = kind;
        self
    }

    /// Use a custom document store.
    ///
    /// The store must key documents on the configured id field.
    pub fn store(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Validate the configuration and build the data layer.
    pub fn build(self) -> Result<Datalayer> {
        self.config.validate()?;
        let store: Arc<dyn DocumentStore> = match self.store {
            Some(store) => store,
            None => Arc::new(InMemoryStore::new(self.config.id_field.as_str())),
        };
        info!(
            id_field = %self.config.id_field,
            cdc = self.config.cdc.running,
            "Opened data layer"
        );
        Ok(Datalayer {
            cdc: CdcFlag::new(self.config.cdc.running),
            config: self.config,
            store,
            models: ModelRegistry::new(),
            listeners: RwLock::new(BTreeMap::new()),
            vector_indexes: RwLock::new(BTreeMap::new()),
            searchers: SearcherRegistry::new(),
            jobs: LocalJobQueue::new(),
            events: EventQueue::new(),
        })
    }
}

impl Default for DatalayerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
