//! Data Layer Comprehensive Test Suite
//!
//! End-to-end tests through the `Datalayer` facade: applying components,
//! propagating document mutations into jobs, and nearest-neighbour search.
//!
//! ## Running Tests
//!
//! ```bash
//! # Run all data layer tests
//! cargo test --test datalayer_comprehensive
//!
//! # Run scheduling tests only
//! cargo test --test datalayer_comprehensive scheduling::
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use confluxdb::prelude::*;
use confluxdb::DataType;

// Test modules
pub mod config;
pub mod events;
pub mod scheduling;
pub mod vector_index;

// =============================================================================
// SHARED TEST UTILITIES
// =============================================================================

/// Install a test subscriber for data-layer logs
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Count of `x`, `y` and `z` characters in a string
pub fn xyz_counts(text: &str) -> Vec<f64> {
    ['x', 'y', 'z']
        .iter()
        .map(|c| text.chars().filter(|t| t == c).count() as f64)
        .collect()
}

/// Model embedding text as its x/y/z character counts, counting calls
pub fn counting_encoder(
    identifier: &str,
    datatype: DataType,
    calls: Arc<AtomicUsize>,
) -> Arc<dyn Model> {
    Arc::new(
        FnModel::new(identifier, move |inputs: &ModelInputs| {
            calls.fetch_add(1, Ordering::SeqCst);
            let text = inputs.args[0].as_str().unwrap_or_default();
            Ok(Value::from(xyz_counts(text)))
        })
        .with_signature(Signature::Singleton)
        .with_datatype(datatype),
    )
}

/// Model embedding text as its x/y/z character counts
pub fn encoder(identifier: &str) -> Arc<dyn Model> {
    counting_encoder(
        identifier,
        vector(&[3]).expect("valid shape"),
        Arc::new(AtomicUsize::new(0)),
    )
}

/// Document with an explicit id and text
pub fn text_doc(id: &str, text: &str) -> Document {
    Document::from_json(json!({"_id": id, "text": text}))
}

/// The standard corpus: a=xxx, b=yyy, c=zzz, d=xxy
pub fn corpus() -> Vec<Document> {
    vec![
        text_doc("a", "xxx"),
        text_doc("b", "yyy"),
        text_doc("c", "zzz"),
        text_doc("d", "xxy"),
    ]
}

/// Data layer with the encoder, an `embed` listener on `docs.text` and a
/// `docs-idx` vector index applied
pub fn indexed_db(builder: DatalayerBuilder) -> Datalayer {
    init_tracing();
    let db = builder.build().expect("valid config");
    db.apply(encoder("encoder")).expect("apply model");
    db.apply(Listener::new("embed", "encoder", "text", Select::table("docs")))
        .expect("apply listener");
    db.apply(VectorIndex::new("docs-idx", Ref::by_id("embed")))
        .expect("apply vector index");
    db
}

/// Process events and run every job, asserting nothing failed
pub fn sync(db: &Datalayer) {
    db.process_events().expect("process events");
    let summary = db.run_jobs().expect("run jobs");
    assert!(summary.failed.is_empty(), "failed jobs: {:?}", summary.failed);
}
