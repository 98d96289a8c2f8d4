//! Job scheduling tests: CDC gating, dependencies and failure propagation.

use super::*;
use confluxdb::{JobKind, JobStatus};
use conflux_vector::VectorError;

fn copy_jobs(db: &Datalayer) -> Vec<confluxdb::Job> {
    db.jobs()
        .jobs()
        .into_iter()
        .filter(|job| matches!(job.kind, JobKind::CopyVectors { .. }))
        .collect()
}

#[test]
fn test_apply_schedules_listener_then_copy() {
    init_tracing();
    let db = Datalayer::new().unwrap();
    db.apply(encoder("encoder")).unwrap();
    let listener_jobs = db
        .apply(Listener::new("embed", "encoder", "text", Select::table("docs")))
        .unwrap();
    assert_eq!(listener_jobs.len(), 1);

    let index_jobs = db
        .apply(VectorIndex::new("docs-idx", Ref::by_id("embed")))
        .unwrap();
    assert_eq!(index_jobs.len(), 1);

    let copy = db.jobs().get(&index_jobs[0]).unwrap();
    assert_eq!(copy.dependencies, listener_jobs);
    assert_eq!(copy.kind.name(), "copy_vectors");
    match copy.kind {
        JobKind::CopyVectors { vector_index, ids, .. } => {
            assert_eq!(vector_index, "docs-idx");
            assert!(ids.is_empty());
        }
        other => panic!("unexpected job {:?}", other),
    }
}

#[test]
fn test_copy_has_no_dependency_once_listener_ran() {
    let db = indexed_db(Datalayer::builder());
    db.run_jobs().unwrap();

    let jobs = db
        .apply(VectorIndex::new("second-idx", Ref::by_id("embed")))
        .unwrap();
    assert_eq!(jobs.len(), 1);
    assert!(db.jobs().get(&jobs[0]).unwrap().dependencies.is_empty());
}

#[test]
fn test_cdc_running_skips_vector_copies() {
    let db = indexed_db(Datalayer::builder().cdc_running(true));
    assert!(copy_jobs(&db).is_empty());

    db.insert("docs", corpus()).unwrap();
    let submitted = db.process_events().unwrap();
    assert_eq!(submitted.len(), 1);
    assert!(copy_jobs(&db).is_empty());

    db.run_jobs().unwrap();
    assert_eq!(db.searchers().get("docs-idx").unwrap().len(), 0);
}

#[test]
fn test_cdc_flag_can_change_at_runtime() {
    let db = indexed_db(Datalayer::builder().cdc_running(true));
    db.cdc().set_running(false);
    let jobs = db
        .apply(VectorIndex::new("late-idx", Ref::by_id("embed")))
        .unwrap();
    assert_eq!(jobs.len(), 1);
}

#[test]
fn test_event_copy_depends_on_listener_job() {
    let db = indexed_db(Datalayer::builder());
    db.run_jobs().unwrap();

    db.insert("docs", corpus()).unwrap();
    let submitted = db.process_events().unwrap();
    assert_eq!(submitted.len(), 2);

    let listener_job = db.jobs().get(&submitted[0]).unwrap();
    let copy_job = db.jobs().get(&submitted[1]).unwrap();
    assert!(matches!(listener_job.kind, JobKind::RunListener { .. }));
    assert_eq!(copy_job.dependencies, vec![listener_job.id.clone()]);
    match copy_job.kind {
        JobKind::CopyVectors { ids, .. } => assert_eq!(ids, vec!["a", "b", "c", "d"]),
        other => panic!("unexpected job {:?}", other),
    }
}

#[test]
fn test_failed_listener_fails_dependent_copy() {
    init_tracing();
    let db = Datalayer::new().unwrap();
    let broken: Arc<dyn Model> = Arc::new(
        FnModel::new("broken", |_: &ModelInputs| {
            Err(VectorError::Prediction {
                model: "broken".into(),
                reason: "offline".into(),
            })
        })
        .with_signature(Signature::Singleton)
        .with_datatype(vector(&[3]).unwrap()),
    );
    db.apply(broken).unwrap();
    db.insert("docs", corpus()).unwrap();
    let listener_jobs = db
        .apply(Listener::new("embed", "broken", "text", Select::table("docs")))
        .unwrap();
    let copy_jobs = db
        .apply(VectorIndex::new("docs-idx", Ref::by_id("embed")))
        .unwrap();

    let summary = db.run_jobs().unwrap();
    assert!(summary.succeeded.is_empty());
    assert_eq!(summary.failed, vec![listener_jobs[0].clone(), copy_jobs[0].clone()]);

    let failed = db.jobs().get(&listener_jobs[0]).unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert!(failed.error.unwrap().contains("offline"));
    assert_eq!(db.jobs().status(&copy_jobs[0]), Some(JobStatus::Failed));
}

#[test]
fn test_delete_removes_vectors() {
    let db = indexed_db(Datalayer::builder());
    db.insert("docs", corpus()).unwrap();
    sync(&db);

    let deleted = db
        .delete("docs", &["a".to_string(), "zz".to_string()])
        .unwrap();
    assert_eq!(deleted, vec!["a"]);
    let submitted = db.process_events().unwrap();
    assert_eq!(submitted.len(), 1);
    assert_eq!(
        db.jobs().get(&submitted[0]).unwrap().kind.name(),
        "delete_vectors"
    );
    sync(&db);

    let searcher = db.searchers().get("docs-idx").unwrap();
    assert!(!searcher.contains("a"));
    assert_eq!(searcher.len(), 3);
}

#[test]
fn test_update_recomputes_vectors() {
    let db = indexed_db(Datalayer::builder());
    db.insert("docs", corpus()).unwrap();
    sync(&db);

    let updated = db
        .update(
            "docs",
            &["b".to_string()],
            &Document::from_json(json!({"text": "xxxxx"})),
        )
        .unwrap();
    assert_eq!(updated, vec!["b"]);
    sync(&db);

    let query = db
        .nearest_query(Document::from_json(json!({"text": "x"})))
        .with_n(2);
    let nearest = db.select_nearest("docs-idx", &query).unwrap();
    assert_eq!(nearest.ids, vec!["a", "b"]);
}

#[test]
fn test_documents_without_key_are_skipped() {
    let db = indexed_db(Datalayer::builder());
    db.insert(
        "docs",
        vec![
            text_doc("a", "xxx"),
            Document::from_json(json!({"_id": "no-text", "title": "t"})),
        ],
    )
    .unwrap();
    sync(&db);

    assert!(db
        .store()
        .get("docs", "no-text")
        .unwrap()
        .unwrap()
        .get_path("_outputs.embed")
        .is_none());
    let searcher = db.searchers().get("docs-idx").unwrap();
    assert!(searcher.contains("a"));
    assert!(!searcher.contains("no-text"));
}

#[test]
fn test_execute_runs_single_job() {
    let db = indexed_db(Datalayer::builder());
    db.insert("docs", vec![text_doc("a", "xxx")]).unwrap();
    let job = confluxdb::Job::new(JobKind::RunListener {
        listener: "embed".into(),
        ids: vec!["a".into()],
    });
    db.execute(&job).unwrap();
    assert!(db
        .store()
        .get("docs", "a")
        .unwrap()
        .unwrap()
        .contains("_outputs.embed"));

    let missing = confluxdb::Job::new(JobKind::RunListener {
        listener: "nope".into(),
        ids: vec![],
    });
    assert!(db.execute(&missing).unwrap_err().is_not_found());
}
