/// Core types used throughout the domain layer
///
/// Identifier newtypes, the habit `Frequency`, and the calendar helpers that
/// translate between stored UTC instants and the user's local calendar days.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveTime, SecondsFormat, SubsecRound, TimeZone, Utc, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a new random identifier
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Parse an identifier from its database/backup representation
            pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a habit
    HabitId
);
uuid_id!(
    /// Unique identifier for a single habit log
    LogId
);
uuid_id!(
    /// Unique identifier for a todo
    TodoId
);

/// Opaque identifier issued by the notification scheduler
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(pub String);

impl NotificationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How often a habit should be performed
///
/// `SpecificDays` is the only variant that carries weekday indices; they live
/// on `Habit::frequency_days` so the stored shape matches the backup file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    #[default]
    Daily,
    Weekly,
    SpecificDays,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::SpecificDays => "specific_days",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "daily" => Some(Frequency::Daily),
            "weekly" => Some(Frequency::Weekly),
            "specific_days" => Some(Frequency::SpecificDays),
            _ => None,
        }
    }

    /// Check if this frequency expects the habit to be done on a given date
    ///
    /// Weekly habits are treated as scheduled every day.
    pub fn is_scheduled_for_date(&self, days: Option<&BTreeSet<u8>>, date: NaiveDate) -> bool {
        match self {
            Frequency::Daily | Frequency::Weekly => true,
            Frequency::SpecificDays => {
                days.is_some_and(|days| days.contains(&weekday_index(date.weekday())))
            }
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Weekday index with Sunday as 0, the encoding stored in `frequencyDays`
pub fn weekday_index(day: Weekday) -> u8 {
    day.num_days_from_sunday() as u8
}

/// Inverse of [`weekday_index`]
pub fn weekday_from_index(index: u8) -> Option<Weekday> {
    match index {
        0 => Some(Weekday::Sun),
        1 => Some(Weekday::Mon),
        2 => Some(Weekday::Tue),
        3 => Some(Weekday::Wed),
        4 => Some(Weekday::Thu),
        5 => Some(Weekday::Fri),
        6 => Some(Weekday::Sat),
        _ => None,
    }
}

/// Fixed-width RFC 3339 rendering used for every stored instant.
///
/// Millisecond precision and a `Z` suffix keep lexical order equal to time
/// order, which the range queries rely on.
pub fn format_instant(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Drop sub-millisecond precision so in-memory values match stored ones
pub fn stored_precision(at: DateTime<Utc>) -> DateTime<Utc> {
    at.trunc_subsecs(3)
}

/// Current instant at stored precision
pub fn now() -> DateTime<Utc> {
    stored_precision(Utc::now())
}

pub fn parse_instant(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}

/// The user's calendar day an instant falls on
pub fn local_date(at: &DateTime<Utc>) -> NaiveDate {
    at.with_timezone(&Local).date_naive()
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Start of a local calendar day as a UTC instant
pub fn local_day_start(date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    match Local.from_local_datetime(&midnight).earliest() {
        Some(at) => at.with_timezone(&Utc),
        // Midnight skipped by a DST jump; the local offset is close enough
        None => Utc.from_utc_datetime(&midnight),
    }
}

/// Half-open UTC interval `[start, end)` covering a local calendar day
pub fn local_day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let next = date.succ_opt().unwrap_or(date);
    (local_day_start(date), local_day_start(next))
}

/// Serde helpers for `HH:MM` reminder times
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn format(time: &NaiveTime) -> String {
        time.format("%H:%M").to_string()
    }

    pub fn parse(s: &str) -> Option<NaiveTime> {
        NaiveTime::parse_from_str(s, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
            .ok()
    }

    pub fn serialize<S: Serializer>(time: &Option<NaiveTime>, serializer: S) -> Result<S::Ok, S::Error> {
        match time {
            Some(time) => serializer.serialize_some(&format(time)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveTime>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw {
            None => Ok(None),
            Some(s) => parse(&s)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid reminder time '{}'", s))),
        }
    }
}
