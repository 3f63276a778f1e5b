/// Statistics engine scenarios over multi-week histories
use chrono::{Duration, Local, NaiveDate, TimeZone, Utc};
use habit_core::*;

fn habit(frequency: Frequency, days: &[u8], target: u32) -> Habit {
    Habit::new(NewHabit {
        name: "Scenario".to_string(),
        frequency,
        frequency_days: (!days.is_empty()).then(|| days.iter().copied().collect()),
        target_value: Some(target),
        ..Default::default()
    })
    .expect("valid habit")
}

fn day(d: u32) -> NaiveDate {
    // January 2024 starts on a Monday
    NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
}

fn log_at(habit: &Habit, date: NaiveDate, hour: u32, value: u32) -> HabitLog {
    let at = Local
        .from_local_datetime(&date.and_hms_opt(hour, 0, 0).unwrap())
        .earliest()
        .unwrap()
        .with_timezone(&Utc);
    HabitLog::new(habit.id.clone(), at, value, None, None).unwrap()
}

#[test]
fn test_weekday_streak_across_weeks_then_break() {
    let habit = habit(Frequency::SpecificDays, &[1, 3, 5], 1);
    // Two full Mon/Wed/Fri weeks, then Mon 15th done and Wed 17th missed
    let mut logs: Vec<HabitLog> = [1, 3, 5, 8, 10, 12, 15, 19]
        .iter()
        .map(|d| log_at(&habit, day(*d), 9, 1))
        .collect();
    logs.reverse(); // input order must not matter

    let stats = compute_stats(&habit, &logs, day(20));
    assert_eq!(stats.best_streak, 7);
    assert_eq!(stats.current_streak, 1);
    assert_eq!(stats.total_days, 8);
}

#[test]
fn test_several_logs_sum_to_target() {
    let habit = habit(Frequency::Daily, &[], 8);
    let logs = vec![
        log_at(&habit, day(2), 8, 3),
        log_at(&habit, day(2), 13, 3),
        log_at(&habit, day(2), 19, 2),
        log_at(&habit, day(3), 9, 7),
    ];

    let stats = compute_stats(&habit, &logs, day(3));
    assert_eq!(stats.per_date_totals[&day(2)], 8);
    assert_eq!(stats.per_date_totals[&day(3)], 7);
    assert_eq!(stats.total_days, 1);
    // Today is still in progress, so yesterday's streak stays current
    assert_eq!(stats.current_streak, 1);
}

#[test]
fn test_completion_rate_counts_only_scheduled_days() {
    // Weekend-only habit; 30 days ending Jan 31 hold 8 weekend days
    let habit = habit(Frequency::SpecificDays, &[0, 6], 1);
    let logs: Vec<HabitLog> = [6, 7, 13, 14]
        .iter()
        .map(|d| log_at(&habit, day(*d), 10, 1))
        .collect();

    let stats = compute_stats(&habit, &logs, day(31));
    assert_eq!(stats.completion_rate, 50);
}

#[test]
fn test_weekly_streaks_not_computed() {
    let habit = habit(Frequency::Weekly, &[], 1);
    let logs: Vec<HabitLog> = (1..=10).map(|d| log_at(&habit, day(d), 9, 1)).collect();

    let stats = compute_stats(&habit, &logs, day(10));
    assert_eq!((stats.current_streak, stats.best_streak), (0, 0));
    assert_eq!(stats.total_days, 10);
    assert!(stats.completion_rate > 0);
}

#[test]
fn test_continuity_predicate() {
    let habit = habit(Frequency::SpecificDays, &[1, 5], 1);
    // Mon 1st to Fri 5th: Tue-Thu are unscheduled
    assert!(is_continuous(&habit, day(1), day(5)));
    // Fri 5th to Fri 12th skips Mon 8th
    assert!(!is_continuous(&habit, day(5), day(12)));
    assert!(is_continuous(&habit, day(5), day(5) + Duration::days(3)));
}
