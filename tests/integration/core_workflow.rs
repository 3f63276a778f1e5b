/// End-to-end habit and todo workflows through `HabitCore`
use std::sync::Arc;

use chrono::{Duration, Local, NaiveTime, TimeZone, Utc};
use habit_core::*;
use tempfile::TempDir;

async fn open_core(dir: &TempDir) -> (HabitCore, Arc<LocalScheduler>) {
    let scheduler = Arc::new(LocalScheduler::new());
    let core = HabitCore::open(Config::new(dir.path().join("habits.db")), scheduler.clone())
        .await
        .expect("Failed to open core");
    (core, scheduler)
}

fn noon_today() -> chrono::DateTime<Utc> {
    let today = Local::now().date_naive();
    Local
        .from_local_datetime(&today.and_hms_opt(12, 0, 0).unwrap())
        .earliest()
        .unwrap()
        .with_timezone(&Utc)
}

#[tokio::test]
async fn test_daily_target_clamp_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let (core, _) = open_core(&dir).await;

    let habit = core
        .habits()
        .create_habit(NewHabit {
            name: "Drink water".to_string(),
            target_value: Some(3),
            unit: Some("glasses".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    tokio_test::assert_ok!(core.habits().log_habit_at(&habit.id, noon_today(), 2, None, None).await);
    let clamped = core
        .habits()
        .log_habit_at(&habit.id, noon_today(), 5, None, None)
        .await
        .unwrap();
    assert_eq!(clamped.value, 1);

    let today = Local::now().date_naive();
    assert_eq!(core.habits().day_total(&habit.id, today), 3);

    let rejected = core.habits().log_habit_at(&habit.id, noon_today(), 1, None, None).await;
    let err = tokio_test::assert_err!(rejected);
    assert!(err.is_domain());
    assert!(matches!(
        err,
        StoreError::Domain(DomainError::DailyTargetReached { target: 3, .. })
    ));

    let stored = core.database().logs_for_date(today).await.unwrap();
    assert_eq!(stored.iter().map(|l| l.value).sum::<u32>(), 3);
}

#[tokio::test]
async fn test_reload_reproduces_cache() {
    let dir = tempfile::tempdir().unwrap();
    let (core, _) = open_core(&dir).await;

    let run = core
        .habits()
        .create_habit(NewHabit {
            name: "Run".to_string(),
            frequency: Frequency::SpecificDays,
            frequency_days: Some([1, 3, 5].into_iter().collect()),
            reminder_time: NaiveTime::from_hms_opt(6, 30, 0),
            ..Default::default()
        })
        .await
        .unwrap();
    let read = core
        .habits()
        .create_habit(NewHabit {
            name: "Read".to_string(),
            target_value: Some(20),
            ..Default::default()
        })
        .await
        .unwrap();

    let first = core.habits().log_habit(&read.id, 5, Some("chapter 1".to_string()), None).await.unwrap();
    core.habits().log_habit(&read.id, 7, None, None).await.unwrap();
    core.habits()
        .edit_log(&first.id, LogPatch { value: Some(6), ..Default::default() })
        .await
        .unwrap();
    core.habits()
        .update_habit(&run.id, HabitPatch { goal: Some("5k".to_string()), ..Default::default() })
        .await
        .unwrap();

    let todo = core
        .todos()
        .add_todo(NewTodo {
            content: "Buy running shoes".to_string(),
            due_date: Some(Utc::now() + Duration::days(1)),
            reminder_time: Some(Utc::now() + Duration::hours(3)),
            categories: Some(["errands".to_string()].into_iter().collect()),
            ..Default::default()
        })
        .await
        .unwrap();
    core.todos().set_completed(&todo.id, true).await.unwrap();
    core.todos()
        .add_todo(NewTodo {
            content: "Plan week".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

    let habits = core.habits().habits();
    let read_logs = core.habits().logs_for(&read.id);
    let read_totals = core.habits().daily_totals(&read.id);
    let mut todos = core.todos().todos();

    // A second core on the same file loads everything from storage
    let (reloaded, _) = open_core(&dir).await;
    assert_eq!(reloaded.habits().habits(), habits);
    assert_eq!(reloaded.habits().logs_for(&read.id), read_logs);
    assert_eq!(reloaded.habits().daily_totals(&read.id), read_totals);

    let mut reloaded_todos = reloaded.todos().todos();
    todos.sort_by_key(|t| t.id.clone());
    reloaded_todos.sort_by_key(|t| t.id.clone());
    assert_eq!(reloaded_todos, todos);

    // Forcing a fetch on the original core is also a no-op for the projection
    core.habits().fetch(true).await.unwrap();
    assert_eq!(core.habits().habits(), habits);
    assert_eq!(core.categories().await.unwrap(), vec!["errands".to_string()]);
}

#[tokio::test]
async fn test_auto_postpone_on_open() {
    let dir = tempfile::tempdir().unwrap();
    let yesterday = Utc::now() - Duration::days(1);

    {
        let (core, _) = open_core(&dir).await;
        core.todos()
            .add_todo(NewTodo {
                content: "Renew passport".to_string(),
                due_date: Some(yesterday),
                auto_postpone: true,
                ..Default::default()
            })
            .await
            .unwrap();
    }

    let (core, _) = open_core(&dir).await;
    let today = Local::now().date_naive();
    assert_eq!(core.todos().todos()[0].due_day(), Some(today));
    assert_eq!(core.database().todos().await.unwrap()[0].due_day(), Some(today));
}

#[tokio::test]
async fn test_permission_denied_creates_habit_without_reminders() {
    let dir = tempfile::tempdir().unwrap();
    let (core, scheduler) = open_core(&dir).await;
    scheduler.set_permission(false);

    let habit = core
        .habits()
        .create_habit(NewHabit {
            name: "Floss".to_string(),
            reminder_time: NaiveTime::from_hms_opt(21, 0, 0),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(habit.notification_ids, Some(Vec::new()));
    assert!(scheduler.pending().is_empty());
}

#[tokio::test]
async fn test_widget_projection_and_theme() {
    let dir = tempfile::tempdir().unwrap();
    let (core, _) = open_core(&dir).await;

    let habit = core
        .habits()
        .create_habit(NewHabit {
            name: "Steps".to_string(),
            target_value: Some(10000),
            ..Default::default()
        })
        .await
        .unwrap();
    core.habits().log_habit_at(&habit.id, noon_today(), 4000, None, None).await.unwrap();
    core.todos()
        .add_todo(NewTodo {
            content: "Stretch".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

    let today = Local::now().date_naive();
    let habits = core.habits().widget_items(today);
    assert_eq!(habits.len(), 1);
    assert_eq!(habits[0].current_value, 4000);
    assert_eq!(core.todos().widget_items(today).len(), 1);

    assert_eq!(core.widget_theme().await.unwrap(), WidgetTheme::Light);
    core.set_widget_theme(WidgetTheme::Dark).await.unwrap();
    assert_eq!(core.widget_theme().await.unwrap(), WidgetTheme::Dark);
}
