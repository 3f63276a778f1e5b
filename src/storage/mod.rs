/// Storage layer for persisting habit and todo data
///
/// This module owns every durable row. `Database` is the persistence engine
/// (one lazily opened SQLite connection with retry on transient failures);
/// the `Storage` trait is the single interface the store layer talks to.

pub mod database;
pub mod migrations;
pub mod rows;
pub mod sqlite;

// Re-export the main storage types
pub use database::*;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::ErrorCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Habit, HabitId, HabitLog, LogId, Todo, TodoId};

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Database connection was closed")]
    ConnectionClosed,

    #[error("Database handle is not available")]
    NullHandle,

    #[error("Database query error: {0}")]
    Query(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Habit not found: {habit_id}")]
    HabitNotFound { habit_id: String },

    #[error("Log not found: {log_id}")]
    LogNotFound { log_id: String },

    #[error("Todo not found: {todo_id}")]
    TodoNotFound { todo_id: String },

    #[error("Migration error: {0}")]
    Migration(String),
}

impl StorageError {
    /// Errors caused by a dead or reclaimed native handle
    ///
    /// These are retried once after the engine reopens its connection; every
    /// other error reaches the caller unchanged.
    pub fn is_transient(&self) -> bool {
        match self {
            StorageError::ConnectionClosed | StorageError::NullHandle => true,
            StorageError::Query(rusqlite::Error::SqliteFailure(err, _)) => {
                matches!(err.code, ErrorCode::ApiMisuse | ErrorCode::CannotOpen)
            }
            _ => false,
        }
    }
}

/// Every durable row, as exported to and restored from a backup file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub habits: Vec<Habit>,
    #[serde(default)]
    pub logs: Vec<HabitLog>,
    #[serde(default)]
    pub todos: Vec<Todo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
}

/// Persistence interface used by the store layer
///
/// `Database` is the SQLite adapter; anything else that can honor these
/// operations (and the all-or-nothing `restore`) can stand in for it.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Non-archived habits, oldest first
    async fn active_habits(&self) -> Result<Vec<Habit>, StorageError>;

    /// Every habit including archived ones
    async fn all_habits(&self) -> Result<Vec<Habit>, StorageError>;

    async fn get_habit(&self, habit_id: &HabitId) -> Result<Habit, StorageError>;

    /// Insert a habit and register its category in the same transaction
    async fn insert_habit(&self, habit: &Habit) -> Result<(), StorageError>;

    /// Update a habit and register its category in the same transaction
    async fn update_habit(&self, habit: &Habit) -> Result<(), StorageError>;

    /// Soft delete: mark the habit archived, keep the row and its logs
    async fn archive_habit(&self, habit_id: &HabitId) -> Result<(), StorageError>;

    async fn logs_for_habit(&self, habit_id: &HabitId) -> Result<Vec<HabitLog>, StorageError>;

    /// Logs whose timestamp falls on a local calendar day
    async fn logs_for_date(&self, date: NaiveDate) -> Result<Vec<HabitLog>, StorageError>;

    /// Logs for an inclusive range of local calendar days
    async fn logs_between(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<HabitLog>, StorageError>;

    async fn logs_since(&self, since: DateTime<Utc>) -> Result<Vec<HabitLog>, StorageError>;

    async fn all_logs(&self) -> Result<Vec<HabitLog>, StorageError>;

    async fn insert_log(&self, log: &HabitLog) -> Result<(), StorageError>;

    async fn update_log(&self, log: &HabitLog) -> Result<(), StorageError>;

    async fn delete_log(&self, log_id: &LogId) -> Result<(), StorageError>;

    /// Todos, newest first
    async fn todos(&self) -> Result<Vec<Todo>, StorageError>;

    /// Insert a todo and register its categories in the same transaction
    async fn insert_todo(&self, todo: &Todo) -> Result<(), StorageError>;

    /// Update a todo and register its categories in the same transaction
    async fn update_todo(&self, todo: &Todo) -> Result<(), StorageError>;

    async fn delete_todo(&self, todo_id: &TodoId) -> Result<(), StorageError>;

    async fn categories(&self) -> Result<Vec<String>, StorageError>;

    /// Create any of the named categories that do not exist yet
    async fn ensure_categories(&self, names: &[String]) -> Result<(), StorageError>;

    async fn setting(&self, key: &str) -> Result<Option<String>, StorageError>;

    async fn set_setting(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Replace every row in every table inside one transaction
    async fn restore(&self, snapshot: &Snapshot) -> Result<(), StorageError>;

    /// Read every row in every table
    async fn snapshot(&self) -> Result<Snapshot, StorageError> {
        Ok(Snapshot {
            habits: self.all_habits().await?,
            logs: self.all_logs().await?,
            todos: self.todos().await?,
            categories: Some(self.categories().await?),
        })
    }
}
