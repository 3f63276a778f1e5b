/// Habit entity and related functionality
///
/// This module defines the core Habit struct, the draft used to create one,
/// the patch used to edit one, and the validation rules both go through.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{hhmm, now, DomainError, Frequency, HabitId, NotificationId};

fn default_target() -> u32 {
    1
}

/// A habit represents something the user wants to do regularly
///
/// Archival is a soft delete: the row is kept forever so its logs stay
/// meaningful, but archived habits never appear in active queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Habit {
    pub id: HabitId,
    /// Display name (e.g., "Morning Run", "Drink water")
    pub name: String,
    #[serde(default)]
    pub goal: String,
    pub frequency: Frequency,
    /// Weekday indices (Sunday = 0); present iff `frequency` is `SpecificDays`
    #[serde(default)]
    pub frequency_days: Option<BTreeSet<u8>>,
    /// Local time of day for the repeating reminder
    #[serde(default, with = "hhmm")]
    pub reminder_time: Option<NaiveTime>,
    /// Scheduler ids for every reminder currently scheduled for this habit
    #[serde(default)]
    pub notification_ids: Option<Vec<NotificationId>>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub archived: bool,
    /// Daily amount that marks a day as completed
    #[serde(default = "default_target")]
    pub target_value: u32,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

/// Everything needed to create a habit
#[derive(Debug, Clone, Default)]
pub struct NewHabit {
    pub name: String,
    pub goal: String,
    pub frequency: Frequency,
    pub frequency_days: Option<BTreeSet<u8>>,
    pub reminder_time: Option<NaiveTime>,
    /// Defaults to 1 when unset
    pub target_value: Option<u32>,
    pub unit: Option<String>,
    pub category: Option<String>,
    pub color: Option<String>,
}

/// Partial update of a habit
///
/// Outer `None` leaves a field untouched; `Some(None)` clears an optional one.
#[derive(Debug, Clone, Default)]
pub struct HabitPatch {
    pub name: Option<String>,
    pub goal: Option<String>,
    pub frequency: Option<Frequency>,
    pub frequency_days: Option<Option<BTreeSet<u8>>>,
    pub reminder_time: Option<Option<NaiveTime>>,
    pub target_value: Option<u32>,
    pub unit: Option<Option<String>>,
    pub category: Option<Option<String>>,
    pub color: Option<Option<String>>,
}

impl Habit {
    /// Create a new habit with validation
    pub fn new(draft: NewHabit) -> Result<Self, DomainError> {
        let mut habit = Self {
            id: HabitId::new(),
            name: draft.name.trim().to_string(),
            goal: draft.goal,
            frequency: draft.frequency,
            frequency_days: draft.frequency_days,
            reminder_time: draft.reminder_time,
            notification_ids: None,
            created_at: now(),
            archived: false,
            target_value: draft.target_value.unwrap_or(1),
            unit: draft.unit,
            category: draft.category,
            color: draft.color,
        };
        habit.normalize();
        habit.validate()?;
        Ok(habit)
    }

    /// Apply a patch, returning the edited habit without touching `self`
    pub fn patched(&self, patch: HabitPatch) -> Result<Self, DomainError> {
        let mut next = self.clone();
        if let Some(name) = patch.name {
            next.name = name.trim().to_string();
        }
        if let Some(goal) = patch.goal {
            next.goal = goal;
        }
        if let Some(frequency) = patch.frequency {
            next.frequency = frequency;
        }
        if let Some(days) = patch.frequency_days {
            next.frequency_days = days;
        }
        if let Some(reminder_time) = patch.reminder_time {
            next.reminder_time = reminder_time;
        }
        if let Some(target_value) = patch.target_value {
            next.target_value = target_value;
        }
        if let Some(unit) = patch.unit {
            next.unit = unit;
        }
        if let Some(category) = patch.category {
            next.category = category;
        }
        if let Some(color) = patch.color {
            next.color = color;
        }
        next.normalize();
        next.validate()?;
        Ok(next)
    }

    /// Whether the reminders scheduled for `self` no longer match `other`
    pub fn reminder_schedule_differs(&self, other: &Habit) -> bool {
        self.reminder_time != other.reminder_time
            || self.frequency != other.frequency
            || self.frequency_days != other.frequency_days
    }

    pub fn is_scheduled_on(&self, date: NaiveDate) -> bool {
        self.frequency
            .is_scheduled_for_date(self.frequency_days.as_ref(), date)
    }

    /// Validate every field against the business rules
    pub fn validate(&self) -> Result<(), DomainError> {
        Self::validate_name(&self.name)?;
        if self.goal.len() > 500 {
            return Err(DomainError::Validation {
                message: "Goal cannot be longer than 500 characters".to_string(),
            });
        }
        self.validate_frequency_days()?;
        Self::validate_target_and_unit(self.target_value, &self.unit)?;
        Ok(())
    }

    /// Weekday sets only make sense for `specific_days`
    pub(crate) fn normalize(&mut self) {
        if self.frequency != Frequency::SpecificDays {
            self.frequency_days = None;
        }
    }

    fn validate_name(name: &str) -> Result<(), DomainError> {
        if name.is_empty() {
            return Err(DomainError::InvalidHabitName(
                "Habit name cannot be empty".to_string(),
            ));
        }
        if name.len() > 100 {
            return Err(DomainError::InvalidHabitName(
                "Habit name cannot be longer than 100 characters".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_frequency_days(&self) -> Result<(), DomainError> {
        if self.frequency != Frequency::SpecificDays {
            return Ok(());
        }
        match &self.frequency_days {
            Some(days) if !days.is_empty() => {
                if let Some(day) = days.iter().find(|day| **day > 6) {
                    return Err(DomainError::InvalidFrequency(format!(
                        "Weekday index must be 0-6, got {}",
                        day
                    )));
                }
                Ok(())
            }
            _ => Err(DomainError::InvalidFrequency(
                "specific_days frequency must select at least one weekday".to_string(),
            )),
        }
    }

    fn validate_target_and_unit(target_value: u32, unit: &Option<String>) -> Result<(), DomainError> {
        if target_value == 0 {
            return Err(DomainError::InvalidValue {
                message: "Target value must be at least 1".to_string(),
            });
        }
        if target_value > 10000 {
            return Err(DomainError::InvalidValue {
                message: "Target value cannot exceed 10000".to_string(),
            });
        }

        if let Some(unit_str) = unit {
            let trimmed = unit_str.trim();
            if trimmed.is_empty() {
                return Err(DomainError::InvalidValue {
                    message: "Unit cannot be empty if specified".to_string(),
                });
            }
            if trimmed.len() > 20 {
                return Err(DomainError::InvalidValue {
                    message: "Unit cannot be longer than 20 characters".to_string(),
                });
            }
        }

        Ok(())
    }
}
