/// Backup export/import through `HabitCore`
use std::sync::Arc;

use chrono::NaiveTime;
use habit_core::*;
use tempfile::TempDir;

async fn open_core(dir: &TempDir, file: &str) -> HabitCore {
    HabitCore::open(Config::new(dir.path().join(file)), Arc::new(LocalScheduler::new()))
        .await
        .expect("Failed to open core")
}

async fn seed(core: &HabitCore) -> HabitId {
    let habit = core
        .habits()
        .create_habit(NewHabit {
            name: "Yoga".to_string(),
            goal: "20 minutes".to_string(),
            category: Some("health".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    core.habits().log_habit(&habit.id, 1, Some("felt good".to_string()), None).await.unwrap();

    let archived = core
        .habits()
        .create_habit(NewHabit {
            name: "Old habit".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    core.habits().archive_habit(&archived.id).await.unwrap();

    core.todos()
        .add_todo(NewTodo {
            content: "Book dentist".to_string(),
            categories: Some(["health".to_string(), "calls".to_string()].into_iter().collect()),
            ..Default::default()
        })
        .await
        .unwrap();
    habit.id
}

fn sorted(mut snapshot: Snapshot) -> Snapshot {
    snapshot.habits.sort_by_key(|h| h.id.clone());
    snapshot.logs.sort_by_key(|l| l.id.clone());
    snapshot.todos.sort_by_key(|t| t.id.clone());
    snapshot
}

#[tokio::test]
async fn test_round_trip_between_stores() {
    let dir = tempfile::tempdir().unwrap();
    let source = open_core(&dir, "source.db").await;
    let habit_id = seed(&source).await;

    let exported = source.export_backup().await.unwrap();
    assert_eq!(exported.version, 1);
    // Archived habits are part of the export
    assert_eq!(exported.data.habits.len(), 2);

    let target = open_core(&dir, "target.db").await;
    target
        .todos()
        .add_todo(NewTodo {
            content: "Will be overwritten".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

    let json = exported.to_json().unwrap();
    target.import_backup(&json).await.unwrap();

    let source_rows = sorted(source.database().snapshot().await.unwrap());
    let target_rows = sorted(target.database().snapshot().await.unwrap());
    assert_eq!(target_rows, source_rows);

    // Caches were refreshed from the restored rows
    assert_eq!(target.habits().habits().len(), 1);
    assert_eq!(target.habits().logs_for(&habit_id).len(), 1);
    assert_eq!(target.todos().todos().len(), 1);
    assert_eq!(target.todos().todos()[0].content, "Book dentist");
}

#[tokio::test]
async fn test_malformed_backup_changes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let core = open_core(&dir, "habits.db").await;
    seed(&core).await;
    let before = sorted(core.database().snapshot().await.unwrap());

    let missing_habits = r#"{"version":1,"timestamp":"2024-04-10T10:00:00.000Z","data":{"todos":[]}}"#;
    let result = core.import_backup(missing_habits).await;
    assert!(matches!(result, Err(CoreError::Backup(BackupError::MissingHabits))));

    let garbage = core.import_backup("{ not json").await;
    assert!(matches!(garbage, Err(CoreError::Backup(BackupError::Malformed(_)))));

    assert_eq!(sorted(core.database().snapshot().await.unwrap()), before);
    assert_eq!(core.habits().habits().len(), 1);
}

#[tokio::test]
async fn test_import_leaves_no_orphaned_reminders() {
    let dir = tempfile::tempdir().unwrap();
    let scheduler = Arc::new(LocalScheduler::new());
    let core = HabitCore::open(Config::new(dir.path().join("habits.db")), scheduler.clone())
        .await
        .unwrap();

    core.habits()
        .create_habit(NewHabit {
            name: "Wake up".to_string(),
            reminder_time: NaiveTime::from_hms_opt(8, 0, 0),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(scheduler.pending().len(), 1);

    let empty = r#"{"version":1,"timestamp":"2024-04-10T10:00:00.000Z","data":{"habits":[]}}"#;
    core.import_backup(empty).await.unwrap();
    assert!(core.habits().habits().is_empty());
    assert!(scheduler.pending().is_empty());

    let with_reminder = r#"{"version":1,"timestamp":"2024-04-10T10:00:00.000Z","data":{"habits":[
        {"id":"6f1c5a38-0c2e-4a8a-9d7e-2f4b8c1d9e01","name":"Evening walk","frequency":"daily",
         "reminderTime":"19:30","notificationIds":["stale-id"],"createdAt":"2024-04-01T08:00:00.000Z"}]}}"#;
    let restored = core.import_backup(with_reminder).await.unwrap();

    let ids = restored.data.habits[0].notification_ids.clone().unwrap();
    assert_eq!(ids.len(), 1);
    assert!(scheduler.is_pending(&ids[0]));
    assert_eq!(scheduler.pending().len(), 1);
    assert_eq!(core.habits().habits()[0].notification_ids, Some(ids));
}
