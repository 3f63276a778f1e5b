/// Backup file export and validated import
///
/// A backup is one JSON document holding every durable row. Import is a
/// full overwrite, so the document is checked completely before storage is
/// touched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::NotificationId;
use crate::notify::Reminders;
use crate::storage::{Snapshot, Storage, StorageError};

/// Format version written into new backups
pub const BACKUP_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Backup file is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Backup file has no habit data")]
    MissingHabits,

    #[error("Backup contents are invalid: {0}")]
    Invalid(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Backup {
    pub version: u32,
    pub timestamp: DateTime<Utc>,
    pub data: Snapshot,
}

impl Backup {
    pub fn new(data: Snapshot) -> Self {
        Self {
            version: BACKUP_VERSION,
            timestamp: Utc::now(),
            data,
        }
    }

    pub fn to_json(&self) -> Result<String, BackupError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse and validate a backup document
    ///
    /// `data.habits` must be present as an array; a file without it is
    /// rejected even if the rest would deserialize.
    pub fn parse(text: &str) -> Result<Self, BackupError> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        let has_habits = value
            .get("data")
            .and_then(|data| data.get("habits"))
            .is_some_and(|habits| habits.is_array());
        if !has_habits {
            return Err(BackupError::MissingHabits);
        }

        let mut backup: Backup = serde_json::from_value(value)?;
        for habit in &mut backup.data.habits {
            habit.normalize();
            habit
                .validate()
                .map_err(|e| BackupError::Invalid(format!("habit {}: {}", habit.id, e)))?;
        }
        Ok(backup)
    }
}

/// Export every row, archived habits included
pub async fn export(storage: &dyn Storage) -> Result<Backup, BackupError> {
    let snapshot = storage.snapshot().await?;
    tracing::info!(
        "Exported {} habits, {} logs, {} todos",
        snapshot.habits.len(),
        snapshot.logs.len(),
        snapshot.todos.len()
    );
    Ok(Backup::new(snapshot))
}

/// Every reminder id held by a snapshot's rows
fn notification_ids(snapshot: &Snapshot) -> Vec<NotificationId> {
    let habit_ids = snapshot.habits.iter().flat_map(|h| h.notification_ids.iter().flatten());
    let todo_ids = snapshot.todos.iter().filter_map(|t| t.notification_id.as_ref());
    habit_ids.chain(todo_ids).cloned().collect()
}

/// Overwrite storage with a parsed backup in one transaction
///
/// Active habits and open todos get fresh reminders, stored with the
/// restored rows in place of the ids from the exporting device. Reminders of
/// the replaced rows are cancelled once the restore has committed; if it
/// fails, the fresh ones are cancelled instead and nothing else changes.
pub async fn import(storage: &dyn Storage, reminders: &Reminders, backup: &Backup) -> Result<Snapshot, BackupError> {
    let replaced = notification_ids(&storage.snapshot().await?);

    let mut data = backup.data.clone();
    let mut fresh = Vec::new();
    let now = Utc::now();
    for habit in data.habits.iter_mut().filter(|h| !h.archived && h.reminder_time.is_some()) {
        let ids = reminders.schedule_for_habit(habit).await;
        fresh.extend(ids.iter().cloned());
        habit.notification_ids = Some(ids);
    }
    for todo in data.todos.iter_mut().filter(|t| !t.is_completed && t.reminder_time.is_some()) {
        todo.notification_id = reminders.schedule_for_todo(todo, now).await;
        fresh.extend(todo.notification_id.iter().cloned());
    }

    if let Err(err) = storage.restore(&data).await {
        reminders.cancel_all(&fresh).await;
        return Err(err.into());
    }
    reminders.cancel_all(&replaced).await;

    tracing::info!(
        "Restored backup from {} ({} habits, {} logs, {} todos)",
        backup.timestamp,
        backup.data.habits.len(),
        backup.data.logs.len(),
        backup.data.todos.len()
    );
    Ok(data)
}
