//! Vector index tests: applying indexes and nearest-neighbour search.

use super::*;
use confluxdb::SearcherKind;

#[test]
fn test_nearest_after_insert() {
    let db = indexed_db(Datalayer::builder());
    db.insert("docs", corpus()).unwrap();
    sync(&db);

    assert_eq!(db.searchers().get("docs-idx").unwrap().len(), 4);

    let query = db
        .nearest_query(Document::from_json(json!({"text": "xxxx"})))
        .with_n(2);
    let nearest = db.select_nearest("docs-idx", &query).unwrap();
    assert_eq!(nearest.ids, vec!["a", "d"]);
    assert!(nearest.scores[0] > nearest.scores[1]);
}

#[test]
fn test_documents_inserted_before_apply_are_indexed() {
    init_tracing();
    let db = Datalayer::new().unwrap();
    db.insert("docs", corpus()).unwrap();

    db.apply(encoder("encoder")).unwrap();
    db.apply(Listener::new("embed", "encoder", "text", Select::table("docs")))
        .unwrap();
    db.apply(VectorIndex::new("docs-idx", Ref::by_id("embed")))
        .unwrap();
    let summary = db.run_jobs().unwrap();
    assert_eq!(summary.succeeded.len(), 2);

    let stored = db.store().get("docs", "b").unwrap().unwrap();
    assert_eq!(
        stored.get_path("_outputs.embed"),
        Some(&Value::from(vec![0.0f64, 3.0, 0.0]))
    );
    assert_eq!(db.searchers().get("docs-idx").unwrap().len(), 4);
}

#[test]
fn test_ties_broken_by_id() {
    let db = indexed_db(Datalayer::builder());
    db.insert("docs", corpus()).unwrap();
    sync(&db);

    // b and c are both orthogonal to the query
    let query = db.nearest_query(Document::from_json(json!({"text": "x"})));
    let nearest = db.select_nearest("docs-idx", &query).unwrap();
    assert_eq!(nearest.ids, vec!["a", "d", "b", "c"]);
}

#[test]
fn test_id_query_skips_model() {
    init_tracing();
    let calls = Arc::new(AtomicUsize::new(0));
    let db = Datalayer::new().unwrap();
    db.apply(counting_encoder("encoder", vector(&[3]).unwrap(), calls.clone()))
        .unwrap();
    db.apply(Listener::new("embed", "encoder", "text", Select::table("docs")))
        .unwrap();
    db.apply(VectorIndex::new("docs-idx", Ref::by_id("embed")))
        .unwrap();
    db.insert("docs", corpus()).unwrap();
    sync(&db);

    let before = calls.load(Ordering::SeqCst);
    let query = db.nearest_query(Document::from_json(json!({"_id": "b", "text": "xxx"})));
    let nearest = db.select_nearest("docs-idx", &query).unwrap();
    assert_eq!(nearest.ids[0], "b");
    assert_eq!(calls.load(Ordering::SeqCst), before);
}

#[test]
fn test_within_ids_restricts_results() {
    let db = indexed_db(Datalayer::builder());
    db.insert("docs", corpus()).unwrap();
    sync(&db);

    let query = db
        .nearest_query(Document::from_json(json!({"text": "xxx"})))
        .with_ids(vec!["b".to_string(), "c".to_string()]);
    let nearest = db.select_nearest("docs-idx", &query).unwrap();
    assert_eq!(nearest.ids, vec!["b", "c"]);
}

#[test]
fn test_unmatched_query_keys() {
    let db = indexed_db(Datalayer::builder());
    db.insert("docs", corpus()).unwrap();
    sync(&db);

    let query = db.nearest_query(Document::from_json(json!({"title": "xxx"})));
    let err = db.select_nearest("docs-idx", &query).unwrap_err();
    assert!(err.is_key_resolution());
    assert!(err.to_string().contains("title"));
}

#[test]
fn test_unknown_index() {
    let db = indexed_db(Datalayer::builder());
    let query = db.nearest_query(Document::from_json(json!({"text": "x"})));
    assert!(db.select_nearest("nope", &query).unwrap_err().is_not_found());
}

#[test]
fn test_compatible_listener_answers_other_keys() {
    let db = indexed_db(Datalayer::builder());
    db.apply(encoder("query-encoder")).unwrap();
    db.apply(
        VectorIndex::new("docs-idx-2", Ref::by_id("embed")).with_compatible_listener(
            Ref::Resolved(Arc::new(Listener::new(
                "embed-query",
                "query-encoder",
                "question",
                Select::table("questions"),
            ))),
        ),
    )
    .unwrap();
    db.insert("docs", corpus()).unwrap();
    sync(&db);

    assert_eq!(db.show("listener").unwrap(), vec!["embed", "embed-query"]);
    let query = db.nearest_query(Document::from_json(json!({"question": "yy"})));
    let nearest = db.select_nearest("docs-idx-2", &query).unwrap();
    assert_eq!(nearest.ids[0], "b");
}

#[test]
fn test_compatible_dimension_mismatch() {
    let db = indexed_db(Datalayer::builder());
    db.apply(counting_encoder(
        "wide",
        vector(&[5]).unwrap(),
        Arc::new(AtomicUsize::new(0)),
    ))
    .unwrap();
    db.apply(Listener::new("embed-wide", "wide", "text", Select::table("docs")))
        .unwrap();
    let err = db
        .apply(
            VectorIndex::new("bad-idx", Ref::by_id("embed"))
                .with_compatible_listener(Ref::by_id("embed-wide")),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        Error::DimensionMismatch {
            expected: 3,
            got: 5
        }
    ));
    assert!(db.load_vector_index("bad-idx").unwrap_err().is_not_found());
}

#[test]
fn test_index_over_unknown_listener() {
    init_tracing();
    let db = Datalayer::new().unwrap();
    let err = db
        .apply(VectorIndex::new("idx", Ref::by_id("missing")))
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_sqlvector_outputs_are_decoded() {
    init_tracing();
    let db = Datalayer::new().unwrap();
    db.apply(counting_encoder(
        "encoder",
        sqlvector(&[3]).unwrap(),
        Arc::new(AtomicUsize::new(0)),
    ))
    .unwrap();
    db.apply(Listener::new("embed", "encoder", "text", Select::table("docs")))
        .unwrap();
    db.apply(VectorIndex::new("docs-idx", Ref::by_id("embed")).with_measure(Measure::L2))
        .unwrap();
    db.insert("docs", corpus()).unwrap();
    sync(&db);

    let stored = db.store().get("docs", "a").unwrap().unwrap();
    assert!(matches!(
        stored.get_path("_outputs.embed"),
        Some(Value::Bytes(bytes)) if bytes.len() == 24
    ));

    let query = db.nearest_query(Document::from_json(json!({"text": "xxx"})));
    let nearest = db.select_nearest("docs-idx", &query).unwrap();
    assert_eq!(nearest.ids[0], "a");
    assert_eq!(nearest.scores[0], 0.0);
}

#[test]
fn test_searcher_kind_from_builder() {
    let db = indexed_db(Datalayer::builder().searcher_kind(SearcherKind::InMemory));
    let searcher = db.searchers().get("docs-idx").unwrap();
    assert_eq!(searcher.dimension(), 3);
    assert_eq!(searcher.measure(), Measure::Cosine);
}
