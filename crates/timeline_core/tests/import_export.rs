use timeline_core::db::open_db_in_memory;
use timeline_core::import::{export_events, import_events, parse_events};
use timeline_core::repo::history_repo::last_update;
use timeline_core::{
    export_file, import_file, EventStore, EventValidationError, ImportError, SqliteEventRepository, StoreError,
};

const DOCUMENT: &str = r#"{
  "events": [
    {"year": 1990, "month": 5, "day": 1, "content": "草の根BBSが開局。", "categories": ["DSNS", "tech"]},
    {"year": 2016, "month": 4, "day": 11, "content": "Mastodon公開。", "categories": ["dsns"]},
    {"year": 2000, "month": 2, "day": 29, "content": "うるう日。"}
  ]
}"#;

#[test]
fn import_file_loads_events_and_records_history() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.json");
    std::fs::write(&path, DOCUMENT).unwrap();
    let conn = open_db_in_memory().unwrap();

    let report = import_file(&conn, &path).unwrap();
    assert_eq!(report.outcome.added, 3);
    assert_eq!(report.total, 3);

    let repo = SqliteEventRepository::new(&conn);
    assert!(repo.by_date(5, 1).unwrap()[0].has_category("dsns"));

    let history = last_update(&conn).unwrap().unwrap();
    assert_eq!(history.status, "success");
    assert_eq!(history.events_added, 3);
    assert_eq!(history.source.as_deref(), Some(path.display().to_string().as_str()));
}

#[test]
fn reimport_counts_updates() {
    let conn = open_db_in_memory().unwrap();
    let events = parse_events(DOCUMENT).unwrap();
    import_events(&conn, &events, None).unwrap();

    let report = import_events(&conn, &events, None).unwrap();
    assert_eq!(report.outcome.added, 0);
    assert_eq!(report.outcome.updated, 3);
    assert_eq!(report.total, 3);
}

#[test]
fn rejected_batch_is_recorded_as_failed() {
    let conn = open_db_in_memory().unwrap();
    let events = parse_events(
        r#"{"events":[
            {"year":1990,"month":5,"day":1,"content":"ok"},
            {"year":1990,"month":4,"day":31,"content":"bad"}
        ]}"#,
    )
    .unwrap();

    let err = import_events(&conn, &events, Some("broken.json")).unwrap_err();
    assert!(matches!(err, ImportError::Store(StoreError::Validation(_))));

    let history = last_update(&conn).unwrap().unwrap();
    assert_eq!(history.status, "failed");
    assert_eq!(history.events_total, 0);
    assert!(history.notes.unwrap().contains("month=4 day=31"));
}

#[test]
fn malformed_tag_fails_the_whole_batch() {
    let conn = open_db_in_memory().unwrap();
    let events = parse_events(
        r#"{"events":[
            {"year":1990,"month":5,"day":1,"content":"ok","categories":["dsns"]},
            {"year":2008,"month":3,"day":3,"content":"炎上","categories":["tech","flame-incident"]}
        ]}"#,
    )
    .unwrap();

    let err = import_events(&conn, &events, Some("tags.json")).unwrap_err();
    assert!(matches!(
        err,
        ImportError::Store(StoreError::Validation(EventValidationError::InvalidCategory(ref tag)))
            if tag == "flame-incident"
    ));
    assert_eq!(SqliteEventRepository::new(&conn).count().unwrap(), 0);

    let history = last_update(&conn).unwrap().unwrap();
    assert_eq!(history.status, "failed");
    assert!(history.notes.unwrap().contains("flame-incident"));
}

#[test]
fn missing_file_is_an_io_error() {
    let conn = open_db_in_memory().unwrap();
    let err = import_file(&conn, std::path::Path::new("/nonexistent/events.json")).unwrap_err();
    assert!(matches!(err, ImportError::Io { .. }));
}

#[test]
fn export_reimports_to_the_same_store_contents() {
    let source = open_db_in_memory().unwrap();
    import_events(&source, &parse_events(DOCUMENT).unwrap(), None).unwrap();
    let source_repo = SqliteEventRepository::new(&source);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("export.json");
    assert_eq!(export_file(&source_repo, &path).unwrap(), 3);

    let target = open_db_in_memory().unwrap();
    import_file(&target, &path).unwrap();
    let target_repo = SqliteEventRepository::new(&target);
    assert_eq!(target_repo.all().unwrap(), source_repo.all().unwrap());

    let json = export_events(&source_repo).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["events"][0]["year"], 1990);
    assert_eq!(value["events"][0]["categories"][0], "dsns");
}
