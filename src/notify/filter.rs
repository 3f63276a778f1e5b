/// Delivery-time filter for fired reminders
///
/// The platform trigger primitive is unreliable: freshly created repeating
/// triggers can fire at once, and late or early deliveries happen. This
/// filter is a best-effort heuristic over that; it does not make delivery
/// exactly-once or exactly-on-time.

use chrono::{DateTime, Duration, Local, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::notify::{ReminderKind, ReminderMetadata, Trigger};

const MINUTES_PER_DAY: i64 = 24 * 60;

/// Tolerances used by [`DeliveryFilter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Habit reminders younger than this are treated as spurious
    pub creation_grace_secs: i64,
    /// Absolute reminders delivered later than this are stale
    pub stale_after_minutes: i64,
    /// Recurring reminders may fire at most this many minutes early
    pub early_tolerance_minutes: i64,
    /// Recurring reminders may fire at most this many minutes late
    pub late_tolerance_minutes: i64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            creation_grace_secs: 15,
            stale_after_minutes: 5,
            early_tolerance_minutes: 1,
            late_tolerance_minutes: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    /// Fired within the grace period after the habit trigger was created
    JustCreated,
    /// Absolute trigger delivered too long after its time
    Stale { late_by: Duration },
    /// Recurring trigger delivered outside its window
    OutsideWindow { offset_minutes: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Show { sound: bool },
    Suppress(SuppressReason),
}

impl Delivery {
    pub fn is_shown(&self) -> bool {
        matches!(self, Delivery::Show { .. })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DeliveryFilter {
    config: FilterConfig,
}

impl DeliveryFilter {
    pub fn new(config: FilterConfig) -> Self {
        Self { config }
    }

    /// Decide whether a fired reminder should be shown at `now`
    pub fn decide(&self, metadata: &ReminderMetadata, trigger: &Trigger, now: DateTime<Local>) -> Delivery {
        let now_utc = now.with_timezone(&Utc);

        if metadata.kind == ReminderKind::Habit {
            if let Some(created_at) = metadata.created_at {
                let age = now_utc - created_at;
                if age >= Duration::zero() && age < Duration::seconds(self.config.creation_grace_secs) {
                    return Delivery::Suppress(SuppressReason::JustCreated);
                }
            }
        }

        match trigger {
            Trigger::At { at } => {
                let late_by = now_utc - *at;
                if late_by > Duration::minutes(self.config.stale_after_minutes) {
                    return Delivery::Suppress(SuppressReason::Stale { late_by });
                }
            }
            Trigger::Daily { hour, minute } | Trigger::Weekly { hour, minute, .. } => {
                let offset_minutes = minute_offset(now, *hour, *minute);
                if offset_minutes < -self.config.early_tolerance_minutes
                    || offset_minutes > self.config.late_tolerance_minutes
                {
                    return Delivery::Suppress(SuppressReason::OutsideWindow { offset_minutes });
                }
            }
        }

        Delivery::Show { sound: true }
    }
}

/// Signed minutes from today's scheduled local time to `now`
///
/// Wrapped into (-12h, +12h] so a reminder set for 23:59 delivered at 00:01
/// counts as two minutes late rather than a day early.
fn minute_offset(now: DateTime<Local>, hour: u32, minute: u32) -> i64 {
    let now_minutes = i64::from(now.hour()) * 60 + i64::from(now.minute());
    let scheduled = i64::from(hour) * 60 + i64::from(minute);
    let mut offset = now_minutes - scheduled;
    if offset > MINUTES_PER_DAY / 2 {
        offset -= MINUTES_PER_DAY;
    } else if offset <= -MINUTES_PER_DAY / 2 {
        offset += MINUTES_PER_DAY;
    }
    offset
}
