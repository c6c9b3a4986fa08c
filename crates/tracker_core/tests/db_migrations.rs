use rusqlite::Connection;
use tracker_core::db::migrations::{apply_migrations, latest_version};
use tracker_core::db::{open_db, open_db_in_memory, DbError};

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    for table in [
        "programs",
        "tracked_entities",
        "notification_templates",
        "program_notification_templates",
        "enrollments",
    ] {
        assert_table_exists(&conn, table);
    }
}

#[test]
fn apply_migrations_reports_applied_migration_names() {
    let mut conn = Connection::open_in_memory().unwrap();

    let applied = apply_migrations(&mut conn).unwrap();
    assert_eq!(applied, vec!["0001_metadata", "0002_enrollments"]);
    assert_eq!(schema_version(&conn), latest_version());

    let reapplied = apply_migrations(&mut conn).unwrap();
    assert!(reapplied.is_empty());
}

#[test]
fn opened_connections_enforce_foreign_keys() {
    let conn = open_db_in_memory().unwrap();
    let enabled: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(enabled, 1);
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tracker.db");

    let conn_first = open_db(&path).unwrap();
    conn_first
        .execute(
            "INSERT INTO programs (uid, name) VALUES ('IpHINAT79UW', 'Child Programme');",
            [],
        )
        .unwrap();
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    let programs: i64 = conn_second
        .query_row("SELECT COUNT(*) FROM programs;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(programs, 1);
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
