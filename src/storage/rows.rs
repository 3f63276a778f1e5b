/// Row decoding and column encoding
///
/// Set/array fields are stored as JSON text; a NULL column decodes to `None`
/// so "never set" stays distinct from "explicitly empty".

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::Row;
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{
    fold_legacy_category, hhmm, parse_instant, Frequency, Habit, HabitId, HabitLog, LogId,
    NotificationId, Todo, TodoId,
};

pub const HABIT_COLUMNS: &str = "id, name, goal, frequency, frequency_days, reminder_time, notification_ids, created_at, archived, target_value, unit, category, color";

pub const LOG_COLUMNS: &str = "id, habit_id, timestamp, value, note, image_uri";

pub const TODO_COLUMNS: &str = "id, content, is_completed, due_date, created_at, reminder_time, notification_id, note, related_habit_id, categories, category, auto_postpone, completed_at";

/// Encode an optional collection as a JSON text column
pub fn to_json_column<T: Serialize + ?Sized>(value: Option<&T>) -> Result<Option<String>, serde_json::Error> {
    value.map(serde_json::to_string).transpose()
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|text| serde_json::from_str(&text).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

fn uuid_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| conversion_error(idx, e))
}

fn opt_uuid_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|text| Uuid::parse_str(&text).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

fn instant_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_instant(&raw).map_err(|e| conversion_error(idx, e))
}

fn opt_instant_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|text| parse_instant(&text).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

/// Decode a row selected with [`HABIT_COLUMNS`]
pub fn habit_from_row(row: &Row<'_>) -> rusqlite::Result<Habit> {
    let frequency_str: String = row.get(3)?;
    let frequency = Frequency::parse(&frequency_str).ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(3, format!("Invalid frequency '{}'", frequency_str), Type::Text)
    })?;

    let reminder_str: Option<String> = row.get(5)?;
    let reminder_time = match reminder_str {
        Some(text) => Some(hhmm::parse(&text).ok_or_else(|| {
            rusqlite::Error::InvalidColumnType(5, format!("Invalid reminder time '{}'", text), Type::Text)
        })?),
        None => None,
    };

    Ok(Habit {
        id: HabitId(uuid_column(row, 0)?),
        name: row.get(1)?,
        goal: row.get(2)?,
        frequency,
        frequency_days: json_column(row, 4)?,
        reminder_time,
        notification_ids: json_column::<Vec<NotificationId>>(row, 6)?,
        created_at: instant_column(row, 7)?,
        archived: row.get(8)?,
        target_value: row.get(9)?,
        unit: row.get(10)?,
        category: row.get(11)?,
        color: row.get(12)?,
    })
}

/// Decode a row selected with [`LOG_COLUMNS`]
pub fn log_from_row(row: &Row<'_>) -> rusqlite::Result<HabitLog> {
    Ok(HabitLog {
        id: LogId(uuid_column(row, 0)?),
        habit_id: HabitId(uuid_column(row, 1)?),
        timestamp: instant_column(row, 2)?,
        value: row.get(3)?,
        note: row.get(4)?,
        image_uri: row.get(5)?,
    })
}

/// Decode a row selected with [`TODO_COLUMNS`], folding the legacy category
pub fn todo_from_row(row: &Row<'_>) -> rusqlite::Result<Todo> {
    let notification_id: Option<String> = row.get(6)?;
    Ok(Todo {
        id: TodoId(uuid_column(row, 0)?),
        content: row.get(1)?,
        is_completed: row.get(2)?,
        due_date: opt_instant_column(row, 3)?,
        created_at: instant_column(row, 4)?,
        reminder_time: opt_instant_column(row, 5)?,
        notification_id: notification_id.map(NotificationId),
        note: row.get(7)?,
        related_habit_id: opt_uuid_column(row, 8)?.map(HabitId),
        categories: fold_legacy_category(json_column(row, 9)?, row.get(10)?),
        auto_postpone: row.get(11)?,
        completed_at: opt_instant_column(row, 12)?,
    })
}
