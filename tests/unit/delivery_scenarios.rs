/// Reminder scheduling and fire-time filtering through the local scheduler
use std::sync::Arc;

use chrono::{Duration, Local, NaiveTime, TimeZone, Timelike, Utc};
use habit_core::notify::{Delivery, FilterConfig, ReminderKind, SuppressReason, Trigger};
use habit_core::*;

#[tokio::test]
async fn test_todo_reminder_stale_after_five_minutes() {
    let scheduler = Arc::new(LocalScheduler::new());
    let reminders = Reminders::new(scheduler.clone(), "reminders");

    let due = Utc::now() + Duration::hours(1);
    let late = reminders
        .schedule_once("Todo reminder", "Pay bills", due, ReminderKind::Todo)
        .await
        .unwrap();
    let on_time = reminders
        .schedule_once("Todo reminder", "Pay bills", due, ReminderKind::Todo)
        .await
        .unwrap();

    let fired_late = scheduler.fire(&late, due.with_timezone(&Local) + Duration::minutes(6));
    assert!(matches!(fired_late, Some(Delivery::Suppress(SuppressReason::Stale { .. }))));

    let fired = scheduler.fire(&on_time, due.with_timezone(&Local) + Duration::minutes(4));
    assert_eq!(fired, Some(Delivery::Show { sound: true }));
}

#[tokio::test]
async fn test_new_habit_reminder_firing_immediately_is_suppressed() {
    let scheduler = Arc::new(LocalScheduler::new());
    let reminders = Reminders::new(scheduler.clone(), "reminders");

    let now = Local::now();
    let habit = Habit::new(NewHabit {
        name: "Vitamins".to_string(),
        reminder_time: NaiveTime::from_hms_opt(now.hour(), now.minute(), 0),
        ..Default::default()
    })
    .unwrap();
    let ids = reminders.schedule_for_habit(&habit).await;
    assert_eq!(ids.len(), 1);

    // Spurious fire right after creation
    let delivery = scheduler.fire(&ids[0], Local::now()).unwrap();
    assert_eq!(delivery, Delivery::Suppress(SuppressReason::JustCreated));
    assert!(scheduler.is_pending(&ids[0]));
}

#[test]
fn test_custom_tolerances() {
    let filter = DeliveryFilter::new(FilterConfig {
        late_tolerance_minutes: 10,
        ..FilterConfig::default()
    });
    let metadata = habit_core::notify::ReminderMetadata {
        kind: ReminderKind::Habit,
        created_at: None,
    };
    let trigger = Trigger::Daily { hour: 9, minute: 0 };
    let at = |h, m| Local.with_ymd_and_hms(2024, 4, 10, h, m, 0).earliest().unwrap();

    assert!(filter.decide(&metadata, &trigger, at(9, 8)).is_shown());
    assert!(!filter.decide(&metadata, &trigger, at(9, 11)).is_shown());
    assert!(!filter.decide(&metadata, &trigger, at(8, 58)).is_shown());
}
