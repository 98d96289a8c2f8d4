//! Event tests: routing mutations to consumers and merging them into jobs.

use super::*;
use confluxdb::{JobKind, FOLD_FIELD};

#[test]
fn test_insert_routes_one_event_per_id_and_consumer() {
    let db = indexed_db(Datalayer::builder());
    let before = db.events().len();
    db.insert("docs", corpus()).unwrap();
    // embed listener + docs-idx index
    assert_eq!(db.events().len() - before, 8);
}

#[test]
fn test_delete_routes_only_to_indexes() {
    let db = indexed_db(Datalayer::builder());
    db.insert("docs", corpus()).unwrap();
    sync(&db);

    db.delete("docs", &["a".to_string(), "b".to_string()])
        .unwrap();
    assert_eq!(db.events().len(), 2);
}

#[test]
fn test_unrelated_table_publishes_nothing() {
    let db = indexed_db(Datalayer::builder());
    sync(&db);
    db.insert("other", corpus()).unwrap();
    assert!(db.events().is_empty());
    assert!(db.process_events().unwrap().is_empty());
}

#[test]
fn test_mutations_without_matches_publish_nothing() {
    let db = indexed_db(Datalayer::builder());
    sync(&db);
    assert!(db
        .update("docs", &["missing".to_string()], &text_doc_patch())
        .unwrap()
        .is_empty());
    assert!(db.delete("docs", &["missing".to_string()]).unwrap().is_empty());
    assert!(db.events().is_empty());
}

fn text_doc_patch() -> Document {
    Document::from_json(json!({"text": "zz"}))
}

#[test]
fn test_events_merge_across_inserts() {
    let db = indexed_db(Datalayer::builder());
    sync(&db);

    db.insert("docs", vec![text_doc("a", "x"), text_doc("b", "y")])
        .unwrap();
    db.insert("docs", vec![text_doc("c", "z")]).unwrap();
    let submitted = db.process_events().unwrap();
    assert_eq!(submitted.len(), 2);

    match db.jobs().get(&submitted[0]).unwrap().kind {
        JobKind::RunListener { listener, ids } => {
            assert_eq!(listener, "embed");
            assert_eq!(ids, vec!["a", "b", "c"]);
        }
        other => panic!("unexpected job {:?}", other),
    }
}

#[test]
fn test_insert_and_delete_in_one_batch() {
    let db = indexed_db(Datalayer::builder());
    sync(&db);

    db.insert("docs", corpus()).unwrap();
    db.delete("docs", &["c".to_string()]).unwrap();
    let submitted = db.process_events().unwrap();
    let names: Vec<&str> = submitted
        .iter()
        .map(|id| db.jobs().get(id).unwrap().kind.name())
        .collect();
    assert_eq!(names, vec!["run_listener", "copy_vectors", "delete_vectors"]);
}

#[test]
fn test_apply_events_do_not_create_jobs() {
    init_tracing();
    let db = Datalayer::new().unwrap();
    db.apply(encoder("encoder")).unwrap();
    assert_eq!(db.events().len(), 1);
    assert!(db.process_events().unwrap().is_empty());
    assert!(db.events().is_empty());
}

#[test]
fn test_fold_assignment() {
    init_tracing();
    let train = Datalayer::builder().fold_probability(0.0).build().unwrap();
    let ids = train.insert("docs", corpus()).unwrap();
    for id in &ids {
        let doc = train.store().get("docs", id).unwrap().unwrap();
        assert_eq!(doc.get(FOLD_FIELD), Some(&Value::from("train")));
    }

    let valid = Datalayer::builder().fold_probability(1.0).build().unwrap();
    let ids = valid
        .insert(
            "docs",
            vec![
                text_doc("a", "x"),
                Document::from_json(json!({"_id": "kept", "_fold": "train"})),
            ],
        )
        .unwrap();
    let folds: Vec<Value> = ids
        .iter()
        .map(|id| {
            valid
                .store()
                .get("docs", id)
                .unwrap()
                .unwrap()
                .get(FOLD_FIELD)
                .cloned()
                .unwrap()
        })
        .collect();
    assert_eq!(folds, vec![Value::from("valid"), Value::from("train")]);
}

#[test]
fn test_generated_ids() {
    init_tracing();
    let db = Datalayer::new().unwrap();
    let ids = db
        .insert("docs", vec![Document::from_json(json!({"text": "x"}))])
        .unwrap();
    assert_eq!(ids.len(), 1);
    assert_eq!(ids[0].len(), 32);
    assert!(db.store().get("docs", &ids[0]).unwrap().is_some());
}

#[test]
fn test_duplicate_ids_rejected_without_events() {
    let db = indexed_db(Datalayer::builder());
    db.insert("docs", corpus()).unwrap();
    sync(&db);

    let err = db.insert("docs", vec![text_doc("a", "x")]).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert!(db.events().is_empty());
}
