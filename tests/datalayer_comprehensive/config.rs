//! Configuration and component registry tests.

use super::*;
use confluxdb::{Bindings, CdcStatus, Config};
use std::io::Write;

#[test]
fn test_from_config_file() {
    init_tracing();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
default_n = 2
fold_probability = 0.0

[cdc]
running = true
"#
    )
    .unwrap();

    let db = Datalayer::from_config_file(file.path()).unwrap();
    assert_eq!(db.config().default_n, 2);
    assert!(db.cdc().is_running());
    assert_eq!(
        db.nearest_query(Document::new()).n,
        2
    );
}

#[test]
fn test_invalid_config_rejected() {
    assert!(matches!(
        Datalayer::builder().fold_probability(2.0).build(),
        Err(Error::Config(_))
    ));
    assert!(Datalayer::builder().default_n(0).build().is_err());

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "default_n = -1").unwrap();
    assert!(Datalayer::from_config_file(file.path()).is_err());
}

#[test]
fn test_custom_id_field() {
    init_tracing();
    let db = Datalayer::builder().id_field("uid").build().unwrap();
    assert_eq!(db.config(), &Config { id_field: "uid".into(), ..Config::default() });
    db.apply(encoder("encoder")).unwrap();
    db.apply(Listener::new("embed", "encoder", "text", Select::table("docs")))
        .unwrap();
    db.apply(VectorIndex::new("docs-idx", Ref::by_id("embed")))
        .unwrap();
    db.insert(
        "docs",
        vec![
            Document::from_json(json!({"uid": 1, "text": "xxx"})),
            Document::from_json(json!({"uid": 2, "text": "yyy"})),
        ],
    )
    .unwrap();
    sync(&db);

    let query = db.nearest_query(Document::from_json(json!({"uid": 2})));
    let nearest = db.select_nearest("docs-idx", &query).unwrap();
    assert_eq!(nearest.ids[0], "2");
}

#[test]
fn test_show_and_stats() {
    let db = indexed_db(Datalayer::builder());
    assert_eq!(db.show("model").unwrap(), vec!["encoder"]);
    assert_eq!(db.show("listener").unwrap(), vec!["embed"]);
    assert_eq!(db.show("vector_index").unwrap(), vec!["docs-idx"]);
    assert!(matches!(db.show("table"), Err(Error::InvalidInput(_))));

    let stats = db.stats();
    assert_eq!(stats.models, 1);
    assert_eq!(stats.listeners, 1);
    assert_eq!(stats.vector_indexes, 1);
    assert_eq!(stats.pending_jobs, 2);
    assert_eq!(stats.pending_events, 3);
}

#[test]
fn test_unbound_variables_rejected() {
    let db = indexed_db(Datalayer::builder());
    let templated = Listener::new(
        "embed-<var:table>",
        "encoder",
        "text",
        Select::table("<var:table>"),
    );
    let err = db.apply(templated.clone()).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert!(err.to_string().contains("table"));

    let mut bindings = Bindings::new();
    bindings.insert("table".into(), Value::from("articles"));
    db.apply_with(templated, &bindings).unwrap();
    let listener = db.load_listener("embed-articles").unwrap();
    assert_eq!(listener.select.table, "articles");
}

#[test]
fn test_listener_with_unknown_model() {
    init_tracing();
    let db = Datalayer::new().unwrap();
    let err = db
        .apply(Listener::new("embed", "missing", "text", Select::table("docs")))
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(db.show("listener").unwrap().is_empty());
}

#[test]
fn test_listener_with_embedded_model() {
    init_tracing();
    let db = Datalayer::new().unwrap();
    db.apply(Listener::with_model(
        "embed",
        encoder("encoder"),
        "text",
        Select::table("docs"),
    ))
    .unwrap();
    assert_eq!(db.show("model").unwrap(), vec!["encoder"]);
    assert!(db.load_model("encoder").is_ok());
}
