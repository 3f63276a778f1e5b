/// Statistics engine: streaks and completion rate for a habit
///
/// Pure functions over a habit definition and its log history. A day is
/// completed when its summed log values reach the habit's target. Days the
/// habit is not scheduled on are transparent to streaks; a missed scheduled
/// day always breaks one.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::domain::{Frequency, Habit, HabitLog};

/// Number of trailing days (today included) the completion rate covers
pub const COMPLETION_WINDOW_DAYS: i64 = 30;

/// Aggregate of every log recorded on one calendar day
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyTotal {
    pub total_value: u32,
    pub count: u32,
}

impl DailyTotal {
    pub fn add(&mut self, value: u32) {
        self.total_value = self.total_value.saturating_add(value);
        self.count += 1;
    }

    pub fn remove(&mut self, value: u32) {
        self.total_value = self.total_value.saturating_sub(value);
        self.count = self.count.saturating_sub(1);
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Calculated statistics for one habit
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitStats {
    /// Number of days whose total reached the target
    pub total_days: u32,
    pub current_streak: u32,
    pub best_streak: u32,
    /// Percentage (0-100) of scheduled days completed in the trailing window
    pub completion_rate: u32,
    pub per_date_totals: BTreeMap<NaiveDate, u32>,
}

/// Sum log values per local calendar day
pub fn daily_totals(logs: &[HabitLog]) -> BTreeMap<NaiveDate, DailyTotal> {
    let mut totals: BTreeMap<NaiveDate, DailyTotal> = BTreeMap::new();
    for log in logs {
        totals.entry(log.date()).or_default().add(log.value);
    }
    totals
}

/// Compute statistics from a full log list
pub fn compute_stats(habit: &Habit, logs: &[HabitLog], today: NaiveDate) -> HabitStats {
    compute_stats_from_totals(habit, &daily_totals(logs), today)
}

/// Compute statistics from already aggregated per-day totals
pub fn compute_stats_from_totals(
    habit: &Habit,
    totals: &BTreeMap<NaiveDate, DailyTotal>,
    today: NaiveDate,
) -> HabitStats {
    let per_date_totals: BTreeMap<NaiveDate, u32> = totals
        .iter()
        .map(|(date, total)| (*date, total.total_value))
        .collect();

    // BTreeMap keys are already ascending
    let completed: Vec<NaiveDate> = per_date_totals
        .iter()
        .filter(|(_, total)| **total >= habit.target_value)
        .map(|(date, _)| *date)
        .collect();

    let (current_streak, best_streak) = match habit.frequency {
        // Weekly streak semantics are undefined; deliberately not computed
        Frequency::Weekly => (0, 0),
        _ => streaks(habit, &completed, today),
    };

    HabitStats {
        total_days: completed.len() as u32,
        current_streak,
        best_streak,
        completion_rate: completion_rate(habit, &per_date_totals, today),
        per_date_totals,
    }
}

/// True iff no scheduled day lies strictly between `prev` and `curr`
pub fn is_continuous(habit: &Habit, prev: NaiveDate, curr: NaiveDate) -> bool {
    let mut day = prev + Duration::days(1);
    while day < curr {
        if habit.is_scheduled_on(day) {
            return false;
        }
        day += Duration::days(1);
    }
    true
}

/// Returns `(current, best)` for ascending completed dates
fn streaks(habit: &Habit, completed: &[NaiveDate], today: NaiveDate) -> (u32, u32) {
    let Some((&first, rest)) = completed.split_first() else {
        return (0, 0);
    };

    let mut best = 1;
    let mut run = 1;
    let mut prev = first;
    for &date in rest {
        if is_continuous(habit, prev, date) {
            run += 1;
        } else {
            run = 1;
        }
        best = best.max(run);
        prev = date;
    }

    // `prev` is now the most recent completed date and `run` the streak ending there
    let current = if is_continuous(habit, prev, today) { run } else { 0 };
    (current, best)
}

fn completion_rate(habit: &Habit, per_date_totals: &BTreeMap<NaiveDate, u32>, today: NaiveDate) -> u32 {
    let mut scheduled = 0u32;
    let mut done = 0u32;
    for offset in (0..COMPLETION_WINDOW_DAYS).rev() {
        let day = today - Duration::days(offset);
        if !habit.is_scheduled_on(day) {
            continue;
        }
        scheduled += 1;
        if per_date_totals
            .get(&day)
            .is_some_and(|total| *total >= habit.target_value)
        {
            done += 1;
        }
    }

    if scheduled == 0 {
        return 0;
    }
    (100.0 * done as f64 / scheduled as f64).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{HabitId, NewHabit};
    use chrono::{Local, TimeZone, Utc};

    fn habit(frequency: Frequency, days: Option<&[u8]>, target: u32) -> Habit {
        Habit::new(NewHabit {
            name: "Test".to_string(),
            frequency,
            frequency_days: days.map(|days| days.iter().copied().collect()),
            target_value: Some(target),
            ..Default::default()
        })
        .unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn log_on(habit_id: &HabitId, day: NaiveDate, value: u32) -> HabitLog {
        let at = Local
            .from_local_datetime(&day.and_hms_opt(12, 0, 0).unwrap())
            .earliest()
            .unwrap()
            .with_timezone(&Utc);
        HabitLog::new(habit_id.clone(), at, value, None, None).unwrap()
    }

    #[test]
    fn test_specific_days_streak_skips_unscheduled_days() {
        // Mon/Wed/Fri habit; 2024-01-01 is a Monday
        let habit = habit(Frequency::SpecificDays, Some(&[1, 3, 5]), 1);
        let logs = vec![
            log_on(&habit.id, date(2024, 1, 1), 1),
            log_on(&habit.id, date(2024, 1, 3), 1),
            log_on(&habit.id, date(2024, 1, 5), 1),
        ];

        let stats = compute_stats(&habit, &logs, date(2024, 1, 6));
        assert_eq!(stats.best_streak, 3);
        assert_eq!(stats.current_streak, 3);
        assert_eq!(stats.total_days, 3);
    }

    #[test]
    fn test_missed_scheduled_day_breaks_streak() {
        let habit = habit(Frequency::SpecificDays, Some(&[1, 3, 5]), 1);
        let logs = vec![
            log_on(&habit.id, date(2024, 1, 1), 1),
            // Wednesday 2024-01-03 missed
            log_on(&habit.id, date(2024, 1, 5), 1),
        ];

        let stats = compute_stats(&habit, &logs, date(2024, 1, 5));
        assert_eq!(stats.best_streak, 1);
        assert_eq!(stats.current_streak, 1);
    }

    #[test]
    fn test_current_streak_survives_pending_today() {
        let habit = habit(Frequency::Daily, None, 1);
        let logs: Vec<HabitLog> = (1..=3)
            .map(|d| log_on(&habit.id, date(2024, 1, d), 1))
            .collect();

        let stats = compute_stats(&habit, &logs, date(2024, 1, 4));
        assert_eq!(stats.current_streak, 3);
        assert_eq!(stats.best_streak, 3);

        // Missing the 4th as well drops the current streak but not the best
        let stats = compute_stats(&habit, &logs, date(2024, 1, 5));
        assert_eq!(stats.current_streak, 0);
        assert_eq!(stats.best_streak, 3);
    }

    #[test]
    fn test_partial_days_do_not_complete() {
        let habit = habit(Frequency::Daily, None, 3);
        let logs = vec![
            log_on(&habit.id, date(2024, 2, 1), 1),
            log_on(&habit.id, date(2024, 2, 1), 2),
            log_on(&habit.id, date(2024, 2, 2), 2),
        ];

        let stats = compute_stats(&habit, &logs, date(2024, 2, 2));
        assert_eq!(stats.total_days, 1);
        assert_eq!(stats.per_date_totals.get(&date(2024, 2, 1)), Some(&3));
        assert_eq!(stats.per_date_totals.get(&date(2024, 2, 2)), Some(&2));
        assert_eq!(stats.current_streak, 1);
    }

    #[test]
    fn test_completion_rate_over_trailing_window() {
        let habit = habit(Frequency::Daily, None, 1);
        let today = date(2024, 1, 30);
        // Every other day across the 30-day window: 15 of 30
        let logs: Vec<HabitLog> = (1..=30)
            .filter(|d| d % 2 == 0)
            .map(|d| log_on(&habit.id, date(2024, 1, d), 1))
            .collect();

        let stats = compute_stats(&habit, &logs, today);
        assert_eq!(stats.completion_rate, 50);
    }

    #[test]
    fn test_weekly_streaks_not_computed() {
        let habit = habit(Frequency::Weekly, None, 1);
        let logs: Vec<HabitLog> = (1..=5)
            .map(|d| log_on(&habit.id, date(2024, 1, d), 1))
            .collect();

        let stats = compute_stats(&habit, &logs, date(2024, 1, 5));
        assert_eq!(stats.current_streak, 0);
        assert_eq!(stats.best_streak, 0);
        assert_eq!(stats.total_days, 5);
    }

    #[test]
    fn test_no_logs() {
        let habit = habit(Frequency::Daily, None, 1);
        let stats = compute_stats(&habit, &[], date(2024, 1, 5));
        assert_eq!(stats.current_streak, 0);
        assert_eq!(stats.best_streak, 0);
        assert_eq!(stats.completion_rate, 0);
        assert!(stats.per_date_totals.is_empty());
    }

    #[test]
    fn test_daily_total_bookkeeping() {
        let mut total = DailyTotal::default();
        total.add(2);
        total.add(3);
        assert_eq!(total, DailyTotal { total_value: 5, count: 2 });
        total.remove(2);
        total.remove(3);
        assert!(total.is_empty());
    }
}
