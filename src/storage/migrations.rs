/// Database schema management
///
/// Tables are created idempotently; columns added after the first release
/// are applied by attempting each `ADD COLUMN` and ignoring "duplicate
/// column" failures. That is the only migration path: nothing is ever
/// dropped or rewritten.

use rusqlite::Connection;

use crate::storage::StorageError;

/// Columns added after the original table definitions: `(table, column, declaration)`
const ADDITIVE_COLUMNS: &[(&str, &str, &str)] = &[
    ("habits", "notification_ids", "TEXT"),
    ("habits", "archived", "INTEGER NOT NULL DEFAULT 0"),
    ("habits", "target_value", "INTEGER NOT NULL DEFAULT 1"),
    ("habits", "unit", "TEXT"),
    ("habits", "category", "TEXT"),
    ("habits", "color", "TEXT"),
    ("habit_logs", "note", "TEXT"),
    ("habit_logs", "image_uri", "TEXT"),
    ("todos", "reminder_time", "TEXT"),
    ("todos", "notification_id", "TEXT"),
    ("todos", "note", "TEXT"),
    ("todos", "related_habit_id", "TEXT"),
    ("todos", "category", "TEXT"),
    ("todos", "categories", "TEXT"),
    ("todos", "auto_postpone", "INTEGER NOT NULL DEFAULT 0"),
    ("todos", "completed_at", "TEXT"),
];

/// Initialize the database schema
///
/// Safe to call on every open: creates missing tables, adds missing
/// columns, then ensures the indexes exist.
pub fn initialize_database(conn: &Connection) -> Result<(), StorageError> {
    create_tables(conn)?;

    let mut added = 0;
    for (table, column, decl) in ADDITIVE_COLUMNS {
        if add_column_if_missing(conn, table, column, decl)? {
            added += 1;
        }
    }
    if added > 0 {
        tracing::info!("Applied {} additive column migrations", added);
    }

    create_indexes(conn)?;
    Ok(())
}

fn create_tables(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS habits (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            goal TEXT NOT NULL DEFAULT '',
            frequency TEXT NOT NULL,
            frequency_days TEXT,
            reminder_time TEXT,
            created_at TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS habit_logs (
            id TEXT PRIMARY KEY,
            habit_id TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            value INTEGER NOT NULL DEFAULT 1
        );
        CREATE TABLE IF NOT EXISTS todos (
            id TEXT PRIMARY KEY,
            content TEXT NOT NULL,
            is_completed INTEGER NOT NULL DEFAULT 0,
            due_date TEXT,
            created_at TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS categories (
            name TEXT PRIMARY KEY,
            created_at TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );",
    )
    .map_err(|e| StorageError::Migration(format!("Failed to create tables: {}", e)))
}

fn create_indexes(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_habits_archived ON habits (archived);
        CREATE INDEX IF NOT EXISTS idx_habit_logs_habit_timestamp ON habit_logs (habit_id, timestamp);
        CREATE INDEX IF NOT EXISTS idx_habit_logs_timestamp ON habit_logs (timestamp);
        CREATE INDEX IF NOT EXISTS idx_todos_created_at ON todos (created_at);",
    )
    .map_err(|e| StorageError::Migration(format!("Failed to create indexes: {}", e)))
}

/// Returns whether the column was actually added
fn add_column_if_missing(
    conn: &Connection,
    table: &str,
    column: &str,
    decl: &str,
) -> Result<bool, StorageError> {
    let sql = format!("ALTER TABLE {table} ADD COLUMN {column} {decl}");
    match conn.execute(&sql, []) {
        Ok(_) => Ok(true),
        Err(err) if is_duplicate_column(&err) => Ok(false),
        Err(err) => Err(StorageError::Migration(format!(
            "Failed to add {table}.{column}: {err}"
        ))),
    }
}

fn is_duplicate_column(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(_, Some(message)) => message.contains("duplicate column name"),
        _ => false,
    }
}
