//! Loader end-to-end against REAL SQLite - no mocks.
//!
//! Each test feeds raw protocol lines through `persist_lines` and inspects the
//! resulting tables.

use serde_json::json;
use strata::{persist_lines, LoadError, Loader, TargetConfig};
use strata_db::{catalog, DbConnection, SqlExecutor};

fn config(batch_size: usize) -> TargetConfig {
    TargetConfig::from_json_str(&format!(
        r#"{{"schema_namespace":"public","database_url":"sqlite::memory:","batch_size":{}}}"#,
        batch_size
    ))
    .unwrap()
}

const USERS_SCHEMA: &str = r#"{"type":"SCHEMA","stream":"users","schema":{"type":"object","properties":{"id":{"type":"integer"},"name":{"type":["null","string"]}}},"key_properties":["id"]}"#;

fn load(batch_size: usize, lines: &[&str]) -> (DbConnection, Result<Option<serde_json::Value>, LoadError>) {
    let mut db = DbConnection::open_sqlite_memory().unwrap();
    let input = lines.join("\n");
    let result = persist_lines(&config(batch_size), input.as_bytes(), &mut db);
    (db, result)
}

fn user_rows(db: &mut DbConnection) -> Vec<(i64, Option<String>)> {
    db.query_all(
        "SELECT \"id\", \"name\" FROM \"public\".\"users\" ORDER BY \"id\"",
        &[],
    )
    .unwrap()
    .iter()
    .map(|row| (row.get(0).unwrap(), row.get(1).unwrap()))
    .collect()
}

// =============================================================================
// Happy path
// =============================================================================

#[test]
fn records_are_merged_and_trailing_state_is_returned() {
    let (mut db, result) = load(
        100,
        &[
            USERS_SCHEMA,
            r#"{"type":"RECORD","stream":"users","record":{"id":1,"name":"ann"}}"#,
            r#"{"type":"RECORD","stream":"users","record":{"id":2,"name":"bo"}}"#,
            r#"{"type":"STATE","value":{"users":2}}"#,
        ],
    );

    assert_eq!(result.unwrap(), Some(json!({"users": 2})));
    assert_eq!(
        user_rows(&mut db),
        vec![(1, Some("ann".to_string())), (2, Some("bo".to_string()))]
    );
}

#[test]
fn repeated_key_keeps_last_value() {
    let (mut db, result) = load(
        100,
        &[
            USERS_SCHEMA,
            r#"{"type":"RECORD","stream":"users","record":{"id":1,"name":"ann"}}"#,
            r#"{"type":"RECORD","stream":"users","record":{"id":1,"name":"anna"}}"#,
            r#"{"type":"RECORD","stream":"users","record":{"id":1,"name":"annie"}}"#,
        ],
    );

    assert_eq!(result.unwrap(), None);
    assert_eq!(user_rows(&mut db), vec![(1, Some("annie".to_string()))]);
}

#[test]
fn batch_size_bounds_each_flush() {
    let mut lines = vec![USERS_SCHEMA.to_string()];
    for id in 0..7 {
        lines.push(format!(
            r#"{{"type":"RECORD","stream":"users","record":{{"id":{}}}}}"#,
            id
        ));
    }
    let mut db = DbConnection::open_sqlite_memory().unwrap();
    let mut loader = Loader::new(&config(3));
    for line in &lines {
        loader.process_line(&mut db, line).unwrap();
    }
    assert_eq!(loader.summary().batches, 2);
    assert_eq!(user_rows(&mut db).len(), 6);

    loader.finish(&mut db).unwrap();
    assert_eq!(user_rows(&mut db).len(), 7);
}

#[test]
fn state_before_later_records_is_not_emitted() {
    let (_db, result) = load(
        100,
        &[
            USERS_SCHEMA,
            r#"{"type":"STATE","value":{"users":0}}"#,
            r#"{"type":"RECORD","stream":"users","record":{"id":1}}"#,
        ],
    );
    assert_eq!(result.unwrap(), None);
}

#[test]
fn second_schema_for_stream_is_ignored() {
    let (mut db, result) = load(
        100,
        &[
            USERS_SCHEMA,
            r#"{"type":"SCHEMA","stream":"users","schema":{"type":"object","properties":{"id":{"type":"integer"},"extra":{"type":"string"}}},"key_properties":["id"]}"#,
            r#"{"type":"RECORD","stream":"users","record":{"id":1,"extra":"x"}}"#,
        ],
    );
    result.unwrap();

    let columns: Vec<String> = catalog::live_columns(&mut db, "public", "users")
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(columns, vec!["id".to_string(), "name".to_string()]);
}

#[test]
fn escaped_nul_and_empty_records_are_dropped() {
    let (mut db, result) = load(
        100,
        &[
            USERS_SCHEMA,
            r#"{"type":"RECORD","stream":"users","record":{}}"#,
            r#"{"type":"RECORD","stream":"users","record":{"id":4,"name":"a\u0000b"}}"#,
            r#"{"type":"ACTIVATE_VERSION","stream":"users","version":1}"#,
            "",
        ],
    );
    result.unwrap();
    assert_eq!(user_rows(&mut db), vec![(4, Some("ab".to_string()))]);
}

#[test]
fn keyless_stream_appends_duplicates() {
    let (mut db, result) = load(
        100,
        &[
            r#"{"type":"SCHEMA","stream":"events","schema":{"type":"object","properties":{"kind":{"type":"string"}}},"key_properties":[]}"#,
            r#"{"type":"RECORD","stream":"events","record":{"kind":"click"}}"#,
            r#"{"type":"RECORD","stream":"events","record":{"kind":"click"}}"#,
        ],
    );
    result.unwrap();
    let count: i64 = db
        .query_scalar("SELECT COUNT(*) FROM \"public\".\"events\"", &[])
        .unwrap();
    assert_eq!(count, 2);
}

// =============================================================================
// Failures
// =============================================================================

#[test]
fn record_before_schema_fails() {
    let (_db, result) = load(
        100,
        &[r#"{"type":"RECORD","stream":"users","record":{"id":1}}"#],
    );
    assert!(matches!(
        result,
        Err(LoadError::RecordBeforeSchema { ref stream }) if stream == "users"
    ));
}

#[test]
fn schema_without_key_properties_fails() {
    let (mut db, result) = load(
        100,
        &[r#"{"type":"SCHEMA","stream":"users","schema":{"type":"object","properties":{"id":{"type":"integer"}}}}"#],
    );
    assert!(matches!(result, Err(LoadError::MissingKeyProperties { .. })));
    db.ensure_namespace("public").unwrap();
    assert!(!catalog::table_exists(&mut db, "public", "users").unwrap());
}

#[test]
fn unknown_message_type_and_bad_json_fail_with_line_number() {
    let (_db, result) = load(100, &[USERS_SCHEMA, r#"{"type":"BOGUS"}"#]);
    assert!(matches!(result, Err(LoadError::Protocol { line: 2, .. })));

    let (_db, result) = load(100, &["not json"]);
    assert!(matches!(result, Err(LoadError::Protocol { line: 1, .. })));
}

#[test]
fn record_missing_key_fails() {
    let (_db, result) = load(
        100,
        &[
            USERS_SCHEMA,
            r#"{"type":"RECORD","stream":"users","record":{"name":"ann"}}"#,
        ],
    );
    assert!(matches!(result, Err(LoadError::Sync { .. })));
}
