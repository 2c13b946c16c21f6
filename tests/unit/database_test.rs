//! Unit tests for the local storage layer (connection + migrations).

use smartmarks::database::migrations::{get_schema_version, run_all, CURRENT_SCHEMA_VERSION};
use smartmarks::database::Database;
use tempfile::TempDir;

#[test]
fn test_open_in_memory_succeeds() {
    let db = Database::open_in_memory();
    assert!(db.is_ok(), "open_in_memory should succeed");
}

#[test]
fn test_migrations_create_all_tables() {
    let db = Database::open_in_memory().expect("open_in_memory failed");
    let conn = db.connection();

    for table in &["users", "sessions", "bookmarks", "oauth_codes", "schema_version"] {
        let exists: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name=?1",
                [table],
                |row| row.get(0),
            )
            .unwrap_or(false);
        assert!(exists, "Table '{}' should exist after migrations", table);
    }
}

#[test]
fn test_bookmark_index_exists() {
    let db = Database::open_in_memory().expect("open_in_memory failed");
    let exists: bool = db
        .connection()
        .query_row(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='index' AND name='idx_bookmarks_user_created'",
            [],
            |row| row.get(0),
        )
        .unwrap_or(false);
    assert!(exists);
}

#[test]
fn test_schema_version_is_current() {
    let db = Database::open_in_memory().expect("open_in_memory failed");
    assert_eq!(get_schema_version(db.connection()), CURRENT_SCHEMA_VERSION);
}

#[test]
fn test_migrations_are_idempotent() {
    let db = Database::open_in_memory().expect("open_in_memory failed");
    run_all(db.connection()).expect("second run should succeed");
    let count: i32 = db
        .connection()
        .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, CURRENT_SCHEMA_VERSION);
}

#[test]
fn test_open_file_persists_across_reopen() {
    let tmp = TempDir::new().expect("Failed to create temp dir");
    let path = tmp.path().join("smartmarks.db");
    {
        let db = Database::open(&path).unwrap();
        db.connection()
            .execute(
                "INSERT INTO users (id, email, created_at) VALUES ('u1', 'a@example.com', 0)",
                [],
            )
            .unwrap();
    }
    let db = Database::open(&path).unwrap();
    let email: String = db
        .connection()
        .query_row("SELECT email FROM users WHERE id = 'u1'", [], |row| row.get(0))
        .unwrap();
    assert_eq!(email, "a@example.com");
    assert_eq!(get_schema_version(db.connection()), CURRENT_SCHEMA_VERSION);
}
