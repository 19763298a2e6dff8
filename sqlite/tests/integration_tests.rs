//! Integration tests for the contentpack-sqlite crate.

use contentpack_core::ContentPack;
use contentpack_sqlite::{SeedDatabase, StatementStatus, apply_statements};
use rusqlite::Connection;
use serde_json::json;

fn pack_with_database(statements: &[&str]) -> ContentPack {
    ContentPack::from_value(json!({
        "metadata": {
            "name": "Seeded",
            "summary": "s",
            "detailed_description": "d",
            "date_exported": "2024-01-01T00:00:00Z",
            "author_name": "a",
            "author_email": "a@example.com",
            "version": "1.0.0"
        },
        "database": statements
    }))
    .unwrap()
}

// ---------------------------------------------------------------------------
// Seeding from pack documents
// ---------------------------------------------------------------------------

#[test]
fn test_seed_pack_statements() {
    let pack = pack_with_database(&[
        "CREATE TABLE emails (id INTEGER PRIMARY KEY, sender TEXT, subject TEXT);",
        "INSERT INTO emails (sender, subject) VALUES ('a@example.com', 'Hi');",
        "INSERT INTO emails (sender, subject) VALUES ('b@example.com', 'Re: Hi');",
        "UPDATE emails SET subject = 'Hello' WHERE id = 1;",
    ]);
    let statements = pack.database.unwrap_or_default();

    let mut db = SeedDatabase::in_memory().unwrap();
    let report = db.apply(&statements).unwrap();

    assert!(report.is_success());
    assert_eq!(report.applied, 4);
    assert_eq!(report.tables, ["emails"]);
    assert_eq!(db.row_count("emails").unwrap(), 2);
    assert!(report.outcomes.iter().all(|o| o.status == StatementStatus::Applied));
}

#[test]
fn test_later_statements_see_earlier_failures() {
    let report = apply_statements(&[
        "CREATE TABLE a (id INTEGER PRIMARY KEY);".to_string(),
        "CREATE TABLE a (id INTEGER PRIMARY KEY);".to_string(),
        "INSERT INTO b VALUES (1);".to_string(),
    ])
    .unwrap();

    assert_eq!(report.applied, 1);
    assert_eq!(report.failed, 2);
    let failed: Vec<_> = report.failures().map(|o| o.index).collect();
    assert_eq!(failed, [1, 2]);
    assert!(report.first_failure().unwrap().contains("already exists"));
}

#[test]
fn test_report_serializes_outcomes() {
    let report = apply_statements(&["PRAGMA user_version = 1;".to_string()]).unwrap();
    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["applied"], 1);
    assert_eq!(value["outcomes"][0]["status"], "applied");
    assert!(value["outcomes"][0]["warning"].is_string());
    assert!(value["outcomes"][0].get("error").is_none());
}

// ---------------------------------------------------------------------------
// File-backed databases
// ---------------------------------------------------------------------------

#[test]
fn test_applied_statements_are_committed_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("seed.db");

    {
        let mut db = SeedDatabase::open(&path).unwrap();
        db.apply(&[
            "CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT);".to_string(),
            "INSERT INTO t (v) VALUES ('kept');".to_string(),
            "INSERT INTO t (id, v) VALUES (1, 'duplicate');".to_string(),
        ])
        .unwrap();
    }

    let conn = Connection::open(&path).unwrap();
    let values: Vec<String> = conn
        .prepare("SELECT v FROM t ORDER BY id")
        .unwrap()
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(values, ["kept"]);
}

#[test]
fn test_wraps_existing_connection() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch("CREATE TABLE existing (id INTEGER);").unwrap();

    let mut db = SeedDatabase::new(conn).unwrap();
    let report = db
        .apply(&["INSERT INTO existing VALUES (7);".to_string()])
        .unwrap();
    assert!(report.is_success());
    assert_eq!(report.tables, ["existing"]);

    let conn = db.into_connection();
    let value: i64 = conn
        .query_row("SELECT id FROM existing", [], |row| row.get(0))
        .unwrap();
    assert_eq!(value, 7);
}
