/// Local reminders: payloads, the scheduler seam, and the delivery filter
///
/// The platform scheduler is an external collaborator reached through
/// `NotificationScheduler`. `Reminders` is what the stores use: it builds
/// payloads, and turns scheduling failures into "no reminder" instead of
/// errors.

pub mod filter;
pub mod local;

pub use filter::*;
pub use local::*;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Local, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{weekday_from_index, Frequency, Habit, NotificationId, Todo};

/// Vibration pattern in milliseconds: wait, buzz, pause, buzz
pub const VIBRATION_PATTERN: [u64; 4] = [0, 250, 250, 250];

/// What a reminder belongs to; carried in the payload metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderKind {
    /// Repeating habit reminder
    Habit,
    /// One-off habit reminder
    HabitOnetime,
    Todo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderMetadata {
    #[serde(rename = "type")]
    pub kind: ReminderKind,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// When a reminder fires, decided at schedule time
///
/// Each variant carries only the fields its kind needs, so the delivery
/// filter dispatches on the tag rather than probing the payload shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Trigger {
    /// Fire once at an absolute instant
    At { at: DateTime<Utc> },
    /// Repeat every day at a local time
    Daily { hour: u32, minute: u32 },
    /// Repeat every week on one weekday at a local time
    Weekly { weekday: Weekday, hour: u32, minute: u32 },
}

impl Trigger {
    pub fn repeats(&self) -> bool {
        !matches!(self, Trigger::At { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Default,
    Max,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
    pub sound: bool,
    pub vibrate: Vec<u64>,
    pub priority: Priority,
    pub channel: String,
}

/// Everything handed to the platform scheduler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub content: NotificationContent,
    pub trigger: Trigger,
    pub metadata: ReminderMetadata,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScheduleError {
    #[error("Notification permission denied")]
    PermissionDenied,

    #[error("Scheduler failure: {0}")]
    Platform(String),
}

/// Platform notification scheduler
#[async_trait]
pub trait NotificationScheduler: Send + Sync {
    async fn schedule(&self, request: NotificationRequest) -> Result<NotificationId, ScheduleError>;

    /// Cancelling an unknown or already fired id must succeed
    async fn cancel(&self, id: &NotificationId) -> Result<(), ScheduleError>;
}

fn habit_body(habit: &Habit) -> String {
    if habit.goal.trim().is_empty() {
        format!("Time for {}", habit.name)
    } else {
        habit.goal.clone()
    }
}

/// Reminder facade used by the stores
#[derive(Clone)]
pub struct Reminders {
    scheduler: Arc<dyn NotificationScheduler>,
    channel: String,
}

impl Reminders {
    pub fn new(scheduler: Arc<dyn NotificationScheduler>, channel: impl Into<String>) -> Self {
        Self {
            scheduler,
            channel: channel.into(),
        }
    }

    fn content(&self, title: &str, body: &str) -> NotificationContent {
        NotificationContent {
            title: title.to_string(),
            body: body.to_string(),
            sound: true,
            vibrate: VIBRATION_PATTERN.to_vec(),
            priority: Priority::Max,
            channel: self.channel.clone(),
        }
    }

    async fn schedule(&self, title: &str, body: &str, trigger: Trigger, kind: ReminderKind) -> Option<NotificationId> {
        let request = NotificationRequest {
            content: self.content(title, body),
            trigger,
            metadata: ReminderMetadata {
                kind,
                created_at: Some(Utc::now()),
            },
        };
        match self.scheduler.schedule(request).await {
            Ok(id) => {
                tracing::debug!("Scheduled {:?} reminder {}", kind, id);
                Some(id)
            }
            Err(err) => {
                tracing::warn!("Reminder not scheduled: {}", err);
                None
            }
        }
    }

    /// One-shot reminder; `None` when the platform refuses
    pub async fn schedule_once(
        &self,
        title: &str,
        body: &str,
        at: DateTime<Utc>,
        kind: ReminderKind,
    ) -> Option<NotificationId> {
        self.schedule(title, body, Trigger::At { at }, kind).await
    }

    /// Repeating reminder; without a weekday it fires every day
    pub async fn schedule_repeating(
        &self,
        title: &str,
        body: &str,
        hour: u32,
        minute: u32,
        weekday: Option<Weekday>,
        kind: ReminderKind,
    ) -> Option<NotificationId> {
        let trigger = match weekday {
            Some(weekday) => Trigger::Weekly { weekday, hour, minute },
            None => Trigger::Daily { hour, minute },
        };
        self.schedule(title, body, trigger, kind).await
    }

    pub async fn cancel(&self, id: &NotificationId) {
        if let Err(err) = self.scheduler.cancel(id).await {
            tracing::warn!("Failed to cancel reminder {}: {}", id, err);
        }
    }

    pub async fn cancel_all(&self, ids: &[NotificationId]) {
        for id in ids {
            self.cancel(id).await;
        }
    }

    /// Schedule every reminder a habit's current settings call for
    ///
    /// Daily habits get one daily trigger, `specific_days` one weekly trigger
    /// per selected weekday, weekly habits one trigger on the weekday they
    /// were created. Denied requests are simply missing from the result.
    pub async fn schedule_for_habit(&self, habit: &Habit) -> Vec<NotificationId> {
        let Some(time) = habit.reminder_time else {
            return Vec::new();
        };
        let body = habit_body(habit);

        let weekdays: Vec<Option<Weekday>> = match habit.frequency {
            Frequency::Daily => vec![None],
            Frequency::Weekly => vec![Some(habit.created_at.with_timezone(&Local).weekday())],
            Frequency::SpecificDays => habit
                .frequency_days
                .iter()
                .flatten()
                .filter_map(|index| weekday_from_index(*index))
                .map(Some)
                .collect(),
        };

        let mut ids = Vec::with_capacity(weekdays.len());
        for weekday in weekdays {
            if let Some(id) = self
                .schedule_repeating(&habit.name, &body, time.hour(), time.minute(), weekday, ReminderKind::Habit)
                .await
            {
                ids.push(id);
            }
        }
        ids
    }

    /// One-shot reminder for a habit, outside its repeating schedule
    pub async fn schedule_habit_once(&self, habit: &Habit, at: DateTime<Utc>) -> Option<NotificationId> {
        self.schedule_once(&habit.name, &habit_body(habit), at, ReminderKind::HabitOnetime)
            .await
    }

    /// Schedule a todo's one-shot reminder if it is still in the future
    pub async fn schedule_for_todo(&self, todo: &Todo, now: DateTime<Utc>) -> Option<NotificationId> {
        let at = todo.reminder_time.filter(|at| *at > now)?;
        self.schedule_once("Todo reminder", &todo.content, at, ReminderKind::Todo)
            .await
    }
}
