/// SQLite implementation of the storage interface
///
/// Every statement is parameterized. Instants are bound in the fixed-width
/// RFC 3339 form so range predicates can compare text directly.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Params};

use crate::domain::{
    format_instant, hhmm, local_day_bounds, local_day_start, Habit, HabitId, HabitLog, LogId, Todo,
    TodoId,
};
use crate::storage::rows::{
    habit_from_row, log_from_row, to_json_column, todo_from_row, HABIT_COLUMNS, LOG_COLUMNS,
    TODO_COLUMNS,
};
use crate::storage::{Database, Snapshot, Storage, StorageError};

fn query_habits<P: Params>(conn: &Connection, filter: &str, params: P) -> Result<Vec<Habit>, StorageError> {
    let sql = format!("SELECT {HABIT_COLUMNS} FROM habits {filter} ORDER BY created_at ASC");
    let mut stmt = conn.prepare(&sql)?;
    let habits = stmt
        .query_map(params, habit_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(habits)
}

fn query_logs<P: Params>(conn: &Connection, filter: &str, params: P) -> Result<Vec<HabitLog>, StorageError> {
    let sql = format!("SELECT {LOG_COLUMNS} FROM habit_logs {filter} ORDER BY timestamp ASC");
    let mut stmt = conn.prepare(&sql)?;
    let logs = stmt
        .query_map(params, log_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(logs)
}

fn insert_habit_row(conn: &Connection, habit: &Habit) -> Result<(), StorageError> {
    conn.execute(
        "INSERT INTO habits (
            id, name, goal, frequency, frequency_days, reminder_time, notification_ids,
            created_at, archived, target_value, unit, category, color
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            habit.id.to_string(),
            habit.name,
            habit.goal,
            habit.frequency.as_str(),
            to_json_column(habit.frequency_days.as_ref())?,
            habit.reminder_time.as_ref().map(hhmm::format),
            to_json_column(habit.notification_ids.as_ref())?,
            format_instant(&habit.created_at),
            habit.archived,
            habit.target_value,
            habit.unit,
            habit.category,
            habit.color,
        ],
    )?;
    Ok(())
}

fn insert_log_row(conn: &Connection, log: &HabitLog) -> Result<(), StorageError> {
    conn.execute(
        "INSERT INTO habit_logs (id, habit_id, timestamp, value, note, image_uri)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            log.id.to_string(),
            log.habit_id.to_string(),
            format_instant(&log.timestamp),
            log.value,
            log.note,
            log.image_uri,
        ],
    )?;
    Ok(())
}

/// Writes the canonical `categories` column; the legacy `category` stays NULL
fn insert_todo_row(conn: &Connection, todo: &Todo) -> Result<(), StorageError> {
    conn.execute(
        "INSERT INTO todos (
            id, content, is_completed, due_date, created_at, reminder_time, notification_id,
            note, related_habit_id, categories, auto_postpone, completed_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            todo.id.to_string(),
            todo.content,
            todo.is_completed,
            todo.due_date.as_ref().map(format_instant),
            format_instant(&todo.created_at),
            todo.reminder_time.as_ref().map(format_instant),
            todo.notification_id.as_ref().map(|id| id.as_str()),
            todo.note,
            todo.related_habit_id.as_ref().map(|id| id.to_string()),
            to_json_column(todo.categories.as_ref())?,
            todo.auto_postpone,
            todo.completed_at.as_ref().map(format_instant),
        ],
    )?;
    Ok(())
}

fn insert_category_row(conn: &Connection, name: &str) -> Result<(), StorageError> {
    conn.execute(
        "INSERT OR IGNORE INTO categories (name, created_at) VALUES (?1, ?2)",
        params![name, format_instant(&Utc::now())],
    )?;
    Ok(())
}

/// Register category names; blank names are skipped
fn insert_category_rows<'a>(
    conn: &Connection,
    names: impl IntoIterator<Item = &'a String>,
) -> Result<(), StorageError> {
    for name in names.into_iter().filter(|name| !name.trim().is_empty()) {
        insert_category_row(conn, name)?;
    }
    Ok(())
}

#[async_trait]
impl Storage for Database {
    async fn active_habits(&self) -> Result<Vec<Habit>, StorageError> {
        self.run("active_habits", |conn| query_habits(conn, "WHERE archived = 0", []))
            .await
    }

    async fn all_habits(&self) -> Result<Vec<Habit>, StorageError> {
        self.run("all_habits", |conn| query_habits(conn, "", [])).await
    }

    async fn get_habit(&self, habit_id: &HabitId) -> Result<Habit, StorageError> {
        let id = habit_id.to_string();
        self.run("get_habit", |conn| {
            let sql = format!("SELECT {HABIT_COLUMNS} FROM habits WHERE id = ?1");
            conn.query_row(&sql, params![id], habit_from_row)
                .optional()?
                .ok_or_else(|| StorageError::HabitNotFound { habit_id: id.clone() })
        })
        .await
    }

    async fn insert_habit(&self, habit: &Habit) -> Result<(), StorageError> {
        self.run("insert_habit", |conn| {
            let tx = conn.transaction()?;
            insert_habit_row(&tx, habit)?;
            insert_category_rows(&tx, habit.category.iter())?;
            tx.commit()?;
            Ok(())
        })
        .await?;
        tracing::debug!("Created habit: {} ({})", habit.name, habit.id);
        Ok(())
    }

    async fn update_habit(&self, habit: &Habit) -> Result<(), StorageError> {
        self.run("update_habit", |conn| {
            let tx = conn.transaction()?;
            let rows_affected = tx.execute(
                "UPDATE habits SET
                    name = ?2,
                    goal = ?3,
                    frequency = ?4,
                    frequency_days = ?5,
                    reminder_time = ?6,
                    notification_ids = ?7,
                    archived = ?8,
                    target_value = ?9,
                    unit = ?10,
                    category = ?11,
                    color = ?12
                 WHERE id = ?1",
                params![
                    habit.id.to_string(),
                    habit.name,
                    habit.goal,
                    habit.frequency.as_str(),
                    to_json_column(habit.frequency_days.as_ref())?,
                    habit.reminder_time.as_ref().map(hhmm::format),
                    to_json_column(habit.notification_ids.as_ref())?,
                    habit.archived,
                    habit.target_value,
                    habit.unit,
                    habit.category,
                    habit.color,
                ],
            )?;
            if rows_affected == 0 {
                return Err(StorageError::HabitNotFound {
                    habit_id: habit.id.to_string(),
                });
            }
            insert_category_rows(&tx, habit.category.iter())?;
            tx.commit()?;
            Ok(())
        })
        .await?;

        tracing::debug!("Updated habit: {} ({})", habit.name, habit.id);
        Ok(())
    }

    async fn archive_habit(&self, habit_id: &HabitId) -> Result<(), StorageError> {
        let id = habit_id.to_string();
        self.run("archive_habit", |conn| {
            let rows_affected = conn.execute("UPDATE habits SET archived = 1 WHERE id = ?1", params![id])?;
            if rows_affected == 0 {
                return Err(StorageError::HabitNotFound { habit_id: id.clone() });
            }
            Ok(())
        })
        .await?;

        tracing::debug!("Archived habit: {}", habit_id);
        Ok(())
    }

    async fn logs_for_habit(&self, habit_id: &HabitId) -> Result<Vec<HabitLog>, StorageError> {
        let id = habit_id.to_string();
        self.run("logs_for_habit", |conn| query_logs(conn, "WHERE habit_id = ?1", params![id]))
            .await
    }

    async fn logs_for_date(&self, date: NaiveDate) -> Result<Vec<HabitLog>, StorageError> {
        let (start, end) = local_day_bounds(date);
        let (start, end) = (format_instant(&start), format_instant(&end));
        self.run("logs_for_date", |conn| {
            query_logs(conn, "WHERE timestamp >= ?1 AND timestamp < ?2", params![start, end])
        })
        .await
    }

    async fn logs_between(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<HabitLog>, StorageError> {
        let from = format_instant(&local_day_start(start));
        let until = format_instant(&local_day_bounds(end).1);
        self.run("logs_between", |conn| {
            query_logs(conn, "WHERE timestamp >= ?1 AND timestamp < ?2", params![from, until])
        })
        .await
    }

    async fn logs_since(&self, since: DateTime<Utc>) -> Result<Vec<HabitLog>, StorageError> {
        let since = format_instant(&since);
        self.run("logs_since", |conn| query_logs(conn, "WHERE timestamp >= ?1", params![since]))
            .await
    }

    async fn all_logs(&self) -> Result<Vec<HabitLog>, StorageError> {
        self.run("all_logs", |conn| query_logs(conn, "", [])).await
    }

    async fn insert_log(&self, log: &HabitLog) -> Result<(), StorageError> {
        self.run("insert_log", |conn| insert_log_row(conn, log)).await?;
        tracing::debug!("Created log {} for habit {} (value {})", log.id, log.habit_id, log.value);
        Ok(())
    }

    async fn update_log(&self, log: &HabitLog) -> Result<(), StorageError> {
        self.run("update_log", |conn| {
            let rows_affected = conn.execute(
                "UPDATE habit_logs SET value = ?2, note = ?3, image_uri = ?4 WHERE id = ?1",
                params![log.id.to_string(), log.value, log.note, log.image_uri],
            )?;
            if rows_affected == 0 {
                return Err(StorageError::LogNotFound { log_id: log.id.to_string() });
            }
            Ok(())
        })
        .await?;

        tracing::debug!("Updated log {}", log.id);
        Ok(())
    }

    async fn delete_log(&self, log_id: &LogId) -> Result<(), StorageError> {
        let id = log_id.to_string();
        self.run("delete_log", |conn| {
            let rows_affected = conn.execute("DELETE FROM habit_logs WHERE id = ?1", params![id])?;
            if rows_affected == 0 {
                return Err(StorageError::LogNotFound { log_id: id.clone() });
            }
            Ok(())
        })
        .await?;

        tracing::debug!("Deleted log {}", log_id);
        Ok(())
    }

    async fn todos(&self) -> Result<Vec<Todo>, StorageError> {
        self.run("todos", |conn| {
            let sql = format!("SELECT {TODO_COLUMNS} FROM todos ORDER BY created_at DESC");
            let mut stmt = conn.prepare(&sql)?;
            let todos = stmt
                .query_map([], todo_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(todos)
        })
        .await
    }

    async fn insert_todo(&self, todo: &Todo) -> Result<(), StorageError> {
        self.run("insert_todo", |conn| {
            let tx = conn.transaction()?;
            insert_todo_row(&tx, todo)?;
            insert_category_rows(&tx, todo.categories.iter().flatten())?;
            tx.commit()?;
            Ok(())
        })
        .await?;
        tracing::debug!("Created todo {}", todo.id);
        Ok(())
    }

    async fn update_todo(&self, todo: &Todo) -> Result<(), StorageError> {
        self.run("update_todo", |conn| {
            let tx = conn.transaction()?;
            let rows_affected = tx.execute(
                "UPDATE todos SET
                    content = ?2,
                    is_completed = ?3,
                    due_date = ?4,
                    reminder_time = ?5,
                    notification_id = ?6,
                    note = ?7,
                    related_habit_id = ?8,
                    categories = ?9,
                    category = NULL,
                    auto_postpone = ?10,
                    completed_at = ?11
                 WHERE id = ?1",
                params![
                    todo.id.to_string(),
                    todo.content,
                    todo.is_completed,
                    todo.due_date.as_ref().map(format_instant),
                    todo.reminder_time.as_ref().map(format_instant),
                    todo.notification_id.as_ref().map(|id| id.as_str()),
                    todo.note,
                    todo.related_habit_id.as_ref().map(|id| id.to_string()),
                    to_json_column(todo.categories.as_ref())?,
                    todo.auto_postpone,
                    todo.completed_at.as_ref().map(format_instant),
                ],
            )?;
            if rows_affected == 0 {
                return Err(StorageError::TodoNotFound { todo_id: todo.id.to_string() });
            }
            insert_category_rows(&tx, todo.categories.iter().flatten())?;
            tx.commit()?;
            Ok(())
        })
        .await?;

        tracing::debug!("Updated todo {}", todo.id);
        Ok(())
    }

    async fn delete_todo(&self, todo_id: &TodoId) -> Result<(), StorageError> {
        let id = todo_id.to_string();
        self.run("delete_todo", |conn| {
            let rows_affected = conn.execute("DELETE FROM todos WHERE id = ?1", params![id])?;
            if rows_affected == 0 {
                return Err(StorageError::TodoNotFound { todo_id: id.clone() });
            }
            Ok(())
        })
        .await?;

        tracing::debug!("Deleted todo {}", todo_id);
        Ok(())
    }

    async fn categories(&self) -> Result<Vec<String>, StorageError> {
        self.run("categories", |conn| {
            let mut stmt = conn.prepare("SELECT name FROM categories ORDER BY name ASC")?;
            let names = stmt
                .query_map([], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            Ok(names)
        })
        .await
    }

    async fn ensure_categories(&self, names: &[String]) -> Result<(), StorageError> {
        if names.is_empty() {
            return Ok(());
        }
        self.run("ensure_categories", |conn| insert_category_rows(conn, names))
        .await
    }

    async fn setting(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.run("setting", |conn| {
            Ok(conn
                .query_row("SELECT value FROM settings WHERE key = ?1", params![key], |row| row.get(0))
                .optional()?)
        })
        .await
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.run("set_setting", |conn| {
            conn.execute(
                "INSERT INTO settings (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )?;
            Ok(())
        })
        .await
    }

    async fn restore(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        self.run("restore", |conn| {
            // Dropping the transaction without commit rolls everything back
            let tx = conn.transaction()?;
            tx.execute_batch(
                "DELETE FROM habit_logs;
                 DELETE FROM todos;
                 DELETE FROM habits;
                 DELETE FROM categories;",
            )?;
            for habit in &snapshot.habits {
                insert_habit_row(&tx, habit)?;
            }
            for log in &snapshot.logs {
                insert_log_row(&tx, log)?;
            }
            for todo in &snapshot.todos {
                insert_todo_row(&tx, todo)?;
            }
            for name in snapshot.categories.iter().flatten() {
                insert_category_row(&tx, name)?;
            }
            tx.commit()?;
            Ok(())
        })
        .await?;

        tracing::info!(
            "Restored {} habits, {} logs, {} todos",
            snapshot.habits.len(),
            snapshot.logs.len(),
            snapshot.todos.len()
        );
        Ok(())
    }
}
