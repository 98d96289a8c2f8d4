//! Job bodies.
//!
//! Each [`JobKind`](conflux_jobs::JobKind) maps onto one function here. They
//! run on the job queue's caller thread and report progress with `tracing`.

use crate::datalayer::Datalayer;
use crate::error::{Error, Result};
use conflux_core::{Document, Value};
use conflux_vector::{embedding_from_value, DataType, Mapping, Select};
use tracing::{debug, info, warn};

/// Compute listener outputs for `ids` (every selected document when empty).
///
/// Documents lacking the listener's key fields are skipped. Returns the
/// number of outputs written.
pub fn run_listener(db: &Datalayer, listener: &str, ids: &[String]) -> Result<usize> {
    let listener = db.load_listener(listener)?;
    let model = listener.model.resolved()?;
    let signature = model.signature();
    let id_field = &db.config().id_field;

    let docs = db.store().select(&listener.select, ids)?;
    let mut written = 0;
    for doc in &docs {
        let Some(id) = doc.id(id_field) else {
            warn!(listener = %listener.identifier, "Skipping document without id");
            continue;
        };
        if !listener.key.matches(doc) {
            debug!(listener = %listener.identifier, id = %id, "Key fields missing, skipping");
            continue;
        }
        let data = Mapping::new(&listener.key, signature).apply(doc)?;
        let inputs = model.handle_input_type(data, signature)?;
        let output = model.predict_one(&inputs.args, &inputs.kwargs)?;
        let stored = match model.datatype() {
            Some(datatype) => datatype.encode(&output)?,
            None => output,
        };
        db.store()
            .set_output(&listener.select.table, &id, &listener.identifier, stored)?;
        written += 1;
    }

    info!(
        listener = %listener.identifier,
        selected = docs.len(),
        written,
        "Listener run complete"
    );
    Ok(written)
}

/// Copy indexing-listener outputs of `ids` into the index's searcher.
///
/// `query` is the serialized select the job was created with; when it does
/// not decode, the indexing listener's current select is used. Documents
/// without outputs are skipped. Returns the number of vectors added.
pub fn copy_vectors(db: &Datalayer, vector_index: &str, ids: &[String], query: &Value) -> Result<usize> {
    let index = db.load_vector_index(vector_index)?;
    let listener = index.indexing_listener.resolved()?;
    let model = listener.model.resolved()?;
    let select = Select::decode(query).unwrap_or_else(|| listener.select.clone());
    let outputs_key = listener.outputs_key();
    let id_field = &db.config().id_field;

    let docs = db.store().select(&select, ids)?;
    let mut items = Vec::with_capacity(docs.len());
    for doc in &docs {
        let Some(id) = doc.id(id_field) else {
            continue;
        };
        match stored_vector(doc, &outputs_key, model.datatype())? {
            Some(vector) => items.push((id, vector)),
            None => debug!(index = %vector_index, id = %id, "No output to copy"),
        }
    }

    let count = items.len();
    if count > 0 {
        db.searchers().get(vector_index)?.add(items)?;
    }
    info!(index = %vector_index, count, "Copied vectors");
    Ok(count)
}

/// Remove the vectors of `ids` from the index's searcher.
pub fn delete_vectors(db: &Datalayer, vector_index: &str, ids: &[String]) -> Result<usize> {
    let removed = db.searchers().get(vector_index)?.delete(ids)?;
    info!(index = %vector_index, requested = ids.len(), removed, "Deleted vectors");
    Ok(removed)
}

fn stored_vector(
    doc: &Document,
    outputs_key: &str,
    datatype: Option<&DataType>,
) -> Result<Option<Vec<f32>>> {
    let Some(stored) = doc.get_path(outputs_key) else {
        return Ok(None);
    };
    let value = match datatype {
        Some(datatype) => datatype.decode(stored)?,
        None => stored.clone(),
    };
    embedding_from_value(&value).map(Some).map_err(Error::from)
}
