/// HabitLog entity for recording progress toward a habit
///
/// A habit can be logged several times per day; the day's total is the sum
/// of the values logged on that local calendar day.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{local_date, stored_precision, DomainError, HabitId, LogId};

/// A single recorded amount for a habit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitLog {
    pub id: LogId,
    /// Which habit this log belongs to (not enforced by the database)
    pub habit_id: HabitId,
    pub timestamp: DateTime<Utc>,
    pub value: u32,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub image_uri: Option<String>,
}

/// Partial update of a log; the timestamp and owning habit are fixed
#[derive(Debug, Clone, Default)]
pub struct LogPatch {
    pub value: Option<u32>,
    pub note: Option<Option<String>>,
    pub image_uri: Option<Option<String>>,
}

impl HabitLog {
    /// Create a new log with validation
    pub fn new(
        habit_id: HabitId,
        timestamp: DateTime<Utc>,
        value: u32,
        note: Option<String>,
        image_uri: Option<String>,
    ) -> Result<Self, DomainError> {
        Self::validate_value(value)?;
        Self::validate_note(&note)?;

        Ok(Self {
            id: LogId::new(),
            habit_id,
            timestamp: stored_precision(timestamp),
            value,
            note,
            image_uri,
        })
    }

    /// The local calendar day this log counts toward
    pub fn date(&self) -> NaiveDate {
        local_date(&self.timestamp)
    }

    pub fn patched(&self, patch: LogPatch) -> Result<Self, DomainError> {
        let mut next = self.clone();
        if let Some(value) = patch.value {
            Self::validate_value(value)?;
            next.value = value;
        }
        if let Some(note) = patch.note {
            Self::validate_note(&note)?;
            next.note = note;
        }
        if let Some(image_uri) = patch.image_uri {
            next.image_uri = image_uri;
        }
        Ok(next)
    }

    fn validate_value(value: u32) -> Result<(), DomainError> {
        if value == 0 {
            return Err(DomainError::InvalidValue {
                message: "Logged value must be at least 1".to_string(),
            });
        }
        if value > 100000 {
            return Err(DomainError::InvalidValue {
                message: "Value cannot exceed 100000".to_string(),
            });
        }
        Ok(())
    }

    fn validate_note(note: &Option<String>) -> Result<(), DomainError> {
        if let Some(text) = note {
            if text.len() > 500 {
                return Err(DomainError::InvalidValue {
                    message: "Notes cannot be longer than 500 characters".to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_valid_log() {
        let habit_id = HabitId::new();
        let log = HabitLog::new(
            habit_id.clone(),
            Utc::now(),
            2,
            Some("After lunch".to_string()),
            None,
        )
        .unwrap();

        assert_eq!(log.habit_id, habit_id);
        assert_eq!(log.value, 2);
        assert_eq!(log.date(), local_date(&log.timestamp));
    }

    #[test]
    fn test_zero_value_invalid() {
        let result = HabitLog::new(HabitId::new(), Utc::now(), 0, None, None);
        assert!(result.is_err());
    }

    #[test]
    fn test_patch_keeps_timestamp() {
        let log = HabitLog::new(HabitId::new(), Utc::now(), 1, None, None).unwrap();
        let edited = log
            .patched(LogPatch {
                value: Some(4),
                note: Some(Some("edited".to_string())),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(edited.id, log.id);
        assert_eq!(edited.timestamp, log.timestamp);
        assert_eq!(edited.value, 4);
        assert_eq!(edited.note.as_deref(), Some("edited"));
    }
}
