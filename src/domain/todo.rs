/// Todo entity
///
/// Todos carry an optional due date, an optional one-shot reminder, and a
/// set of category labels. Older records stored a single `category`; it is
/// folded into `categories` whenever a todo is read.

use std::collections::BTreeSet;

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{local_date, local_day_start, now, stored_precision, DomainError, HabitId, NotificationId, TodoId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "TodoRecord")]
pub struct Todo {
    pub id: TodoId,
    pub content: String,
    pub is_completed: bool,
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// Instant the one-shot reminder should fire
    pub reminder_time: Option<DateTime<Utc>>,
    pub notification_id: Option<NotificationId>,
    pub note: Option<String>,
    pub related_habit_id: Option<HabitId>,
    pub categories: Option<BTreeSet<String>>,
    pub auto_postpone: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Wire shape accepted when reading a todo, including the legacy field
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TodoRecord {
    id: TodoId,
    content: String,
    #[serde(default)]
    is_completed: bool,
    #[serde(default)]
    due_date: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    #[serde(default)]
    reminder_time: Option<DateTime<Utc>>,
    #[serde(default)]
    notification_id: Option<NotificationId>,
    #[serde(default)]
    note: Option<String>,
    #[serde(default)]
    related_habit_id: Option<HabitId>,
    #[serde(default)]
    categories: Option<BTreeSet<String>>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    auto_postpone: bool,
    #[serde(default)]
    completed_at: Option<DateTime<Utc>>,
}

impl From<TodoRecord> for Todo {
    fn from(record: TodoRecord) -> Self {
        Self {
            id: record.id,
            content: record.content,
            is_completed: record.is_completed,
            due_date: record.due_date,
            created_at: record.created_at,
            reminder_time: record.reminder_time,
            notification_id: record.notification_id,
            note: record.note,
            related_habit_id: record.related_habit_id,
            categories: fold_legacy_category(record.categories, record.category),
            auto_postpone: record.auto_postpone,
            completed_at: record.completed_at,
        }
    }
}

/// Merge a legacy single `category` into the category set
pub fn fold_legacy_category(
    categories: Option<BTreeSet<String>>,
    legacy: Option<String>,
) -> Option<BTreeSet<String>> {
    match legacy.filter(|name| !name.trim().is_empty()) {
        None => categories,
        Some(name) => {
            let mut set = categories.unwrap_or_default();
            set.insert(name);
            Some(set)
        }
    }
}

/// Everything needed to create a todo
#[derive(Debug, Clone, Default)]
pub struct NewTodo {
    pub content: String,
    pub due_date: Option<DateTime<Utc>>,
    pub reminder_time: Option<DateTime<Utc>>,
    pub note: Option<String>,
    pub related_habit_id: Option<HabitId>,
    pub categories: Option<BTreeSet<String>>,
    pub auto_postpone: bool,
}

/// Partial update of a todo
///
/// Outer `None` leaves a field untouched; `Some(None)` clears an optional one.
#[derive(Debug, Clone, Default)]
pub struct TodoPatch {
    pub content: Option<String>,
    pub due_date: Option<Option<DateTime<Utc>>>,
    pub reminder_time: Option<Option<DateTime<Utc>>>,
    pub note: Option<Option<String>>,
    pub related_habit_id: Option<Option<HabitId>>,
    pub categories: Option<Option<BTreeSet<String>>>,
    pub auto_postpone: Option<bool>,
}

impl Todo {
    pub fn new(draft: NewTodo) -> Result<Self, DomainError> {
        let content = draft.content.trim().to_string();
        Self::validate_content(&content)?;

        Ok(Self {
            id: TodoId::new(),
            content,
            is_completed: false,
            due_date: draft.due_date.map(stored_precision),
            created_at: now(),
            reminder_time: draft.reminder_time.map(stored_precision),
            notification_id: None,
            note: draft.note,
            related_habit_id: draft.related_habit_id,
            categories: draft.categories,
            auto_postpone: draft.auto_postpone,
            completed_at: None,
        })
    }

    pub fn patched(&self, patch: TodoPatch) -> Result<Self, DomainError> {
        let mut next = self.clone();
        if let Some(content) = patch.content {
            let content = content.trim().to_string();
            Self::validate_content(&content)?;
            next.content = content;
        }
        if let Some(due_date) = patch.due_date {
            next.due_date = due_date.map(stored_precision);
        }
        if let Some(reminder_time) = patch.reminder_time {
            next.reminder_time = reminder_time.map(stored_precision);
        }
        if let Some(note) = patch.note {
            next.note = note;
        }
        if let Some(related) = patch.related_habit_id {
            next.related_habit_id = related;
        }
        if let Some(categories) = patch.categories {
            next.categories = categories;
        }
        if let Some(auto_postpone) = patch.auto_postpone {
            next.auto_postpone = auto_postpone;
        }
        Ok(next)
    }

    /// Flip completion, keeping `completed_at` in step with the transition
    pub fn set_completed(&mut self, completed: bool, now: DateTime<Utc>) {
        if completed && !self.is_completed {
            self.completed_at = Some(stored_precision(now));
        } else if !completed {
            self.completed_at = None;
        }
        self.is_completed = completed;
    }

    /// Due date's calendar day in local time
    pub fn due_day(&self) -> Option<NaiveDate> {
        self.due_date.as_ref().map(local_date)
    }

    /// Whether the next read should move this todo's due date to `today`
    pub fn needs_postpone(&self, today: NaiveDate) -> bool {
        self.auto_postpone && !self.is_completed && self.due_day().is_some_and(|due| due < today)
    }

    /// The due date moved onto `today`, keeping the local time of day
    pub fn postponed_due_date(&self, today: NaiveDate) -> DateTime<Utc> {
        let time = self
            .due_date
            .map(|due| due.with_timezone(&Local).time())
            .unwrap_or_default();
        match Local.from_local_datetime(&today.and_time(time)).earliest() {
            Some(at) => at.with_timezone(&Utc),
            None => local_day_start(today),
        }
    }

    /// Whether the todo's reminder is still ahead of `now`
    pub fn has_pending_reminder(&self, now: DateTime<Utc>) -> bool {
        !self.is_completed && self.reminder_time.is_some_and(|at| at > now)
    }

    fn validate_content(content: &str) -> Result<(), DomainError> {
        if content.is_empty() {
            return Err(DomainError::Validation {
                message: "Todo content cannot be empty".to_string(),
            });
        }
        if content.len() > 1000 {
            return Err(DomainError::Validation {
                message: "Todo content cannot be longer than 1000 characters".to_string(),
            });
        }
        Ok(())
    }
}
