/// Habit aggregate: cached active habits, their logs and per-day totals

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};

use crate::domain::{
    compute_stats_from_totals, daily_totals, local_date, DailyTotal, DomainError, Habit, HabitId, HabitLog,
    HabitPatch, HabitStats, LogId, LogPatch, NewHabit, NotificationId,
};
use crate::notify::Reminders;
use crate::storage::{Storage, StorageError};
use crate::store::{habit_widget_items, HabitWidgetItem, OptimisticCache, StoreError};

#[derive(Debug, Clone, Default)]
struct HabitState {
    loaded: bool,
    /// Active habits in creation order
    habits: Vec<Habit>,
    logs: HashMap<HabitId, Vec<HabitLog>>,
    /// Per-habit totals keyed by local date, kept in step with `logs`
    daily: HashMap<HabitId, BTreeMap<NaiveDate, DailyTotal>>,
}

impl HabitState {
    fn find_log(&self, log_id: &LogId) -> Option<&HabitLog> {
        self.logs.values().flatten().find(|log| log.id == *log_id)
    }

    fn day_total(&self, habit_id: &HabitId, date: NaiveDate) -> u32 {
        self.daily
            .get(habit_id)
            .and_then(|days| days.get(&date))
            .map(|total| total.total_value)
            .unwrap_or(0)
    }

    fn add_log(&mut self, log: HabitLog) {
        self.adjust_total(&log, |total, value| total.add(value));
        self.logs.entry(log.habit_id.clone()).or_default().push(log);
    }

    /// Swap an edited log in place, moving its value between day totals
    fn replace_log(&mut self, old: &HabitLog, new: HabitLog) {
        self.adjust_total(old, |total, value| total.remove(value));
        self.adjust_total(&new, |total, value| total.add(value));
        if let Some(slot) = self
            .logs
            .get_mut(&old.habit_id)
            .and_then(|logs| logs.iter_mut().find(|l| l.id == old.id))
        {
            *slot = new;
        }
    }

    fn adjust_total(&mut self, log: &HabitLog, f: impl FnOnce(&mut DailyTotal, u32)) {
        let days = self.daily.entry(log.habit_id.clone()).or_default();
        let date = log.date();
        let total = days.entry(date).or_default();
        f(total, log.value);
        if total.is_empty() {
            days.remove(&date);
        }
    }

    fn remove_log(&mut self, log: &HabitLog) {
        if let Some(logs) = self.logs.get_mut(&log.habit_id) {
            logs.retain(|l| l.id != log.id);
        }
        self.adjust_total(log, |total, value| total.remove(value));
    }
}

/// Which notification ids to store after rescheduling
///
/// With a reminder time the fresh ids are kept, even if the platform denied
/// every one of them. Without one, an explicit empty list records that
/// reminders were removed; a habit that never had any stays unset.
fn stored_notification_ids(
    next: &Habit,
    previous: Option<&Vec<NotificationId>>,
    fresh: Vec<NotificationId>,
) -> Option<Vec<NotificationId>> {
    if next.reminder_time.is_some() {
        Some(fresh)
    } else if previous.is_some_and(|ids| !ids.is_empty()) {
        Some(Vec::new())
    } else {
        None
    }
}

pub struct HabitStore {
    storage: Arc<dyn Storage>,
    reminders: Reminders,
    cache: OptimisticCache<HabitState>,
}

impl HabitStore {
    pub fn new(storage: Arc<dyn Storage>, reminders: Reminders) -> Self {
        Self {
            storage,
            reminders,
            cache: OptimisticCache::new(HabitState::default()),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.cache.read(|state| state.loaded)
    }

    /// Load active habits and every log; a no-op once loaded unless forced
    pub async fn fetch(&self, force: bool) -> Result<(), StoreError> {
        if self.is_loaded() && !force {
            return Ok(());
        }

        let habits = self.storage.active_habits().await?;
        let mut logs: HashMap<HabitId, Vec<HabitLog>> = HashMap::new();
        for log in self.storage.all_logs().await? {
            logs.entry(log.habit_id.clone()).or_default().push(log);
        }
        let daily = logs
            .iter()
            .map(|(habit_id, logs)| (habit_id.clone(), daily_totals(logs)))
            .collect();

        tracing::debug!("Loaded {} active habits", habits.len());
        self.cache.replace(HabitState {
            loaded: true,
            habits,
            logs,
            daily,
        });
        Ok(())
    }

    pub fn habits(&self) -> Vec<Habit> {
        self.cache.read(|state| state.habits.clone())
    }

    pub fn habit(&self, habit_id: &HabitId) -> Option<Habit> {
        self.cache
            .read(|state| state.habits.iter().find(|h| h.id == *habit_id).cloned())
    }

    fn require_habit(&self, habit_id: &HabitId) -> Result<Habit, StoreError> {
        self.habit(habit_id).ok_or_else(|| {
            StorageError::HabitNotFound {
                habit_id: habit_id.to_string(),
            }
            .into()
        })
    }

    /// Logs recorded for a habit, oldest first
    pub fn logs_for(&self, habit_id: &HabitId) -> Vec<HabitLog> {
        self.cache
            .read(|state| state.logs.get(habit_id).cloned().unwrap_or_default())
    }

    pub fn day_total(&self, habit_id: &HabitId, date: NaiveDate) -> u32 {
        self.cache.read(|state| state.day_total(habit_id, date))
    }

    pub fn daily_totals(&self, habit_id: &HabitId) -> BTreeMap<NaiveDate, DailyTotal> {
        self.cache
            .read(|state| state.daily.get(habit_id).cloned().unwrap_or_default())
    }

    pub fn stats(&self, habit_id: &HabitId, today: NaiveDate) -> Result<HabitStats, StoreError> {
        let habit = self.require_habit(habit_id)?;
        Ok(self.cache.read(|state| {
            let empty = BTreeMap::new();
            let totals = state.daily.get(habit_id).unwrap_or(&empty);
            compute_stats_from_totals(&habit, totals, today)
        }))
    }

    /// Widget rows for habits scheduled on `today`
    pub fn widget_items(&self, today: NaiveDate) -> Vec<HabitWidgetItem> {
        self.cache.read(|state| {
            habit_widget_items(&state.habits, today, |habit_id| state.day_total(habit_id, today))
        })
    }

    pub async fn create_habit(&self, draft: NewHabit) -> Result<Habit, StoreError> {
        let mut habit = Habit::new(draft)?;
        let fresh = self.reminders.schedule_for_habit(&habit).await;
        habit.notification_ids = stored_notification_ids(&habit, None, fresh.clone());

        let result = self
            .cache
            .mutate(
                |state| state.habits.push(habit.clone()),
                self.storage.insert_habit(&habit),
            )
            .await;

        if let Err(err) = result {
            self.reminders.cancel_all(&fresh).await;
            return Err(err.into());
        }
        tracing::info!("Created habit '{}' ({})", habit.name, habit.id);
        Ok(habit)
    }

    /// Edit a habit, replacing its reminders when their schedule changed
    pub async fn update_habit(&self, habit_id: &HabitId, patch: HabitPatch) -> Result<Habit, StoreError> {
        let current = self.require_habit(habit_id)?;
        let mut next = current.patched(patch)?;

        let mut fresh = Vec::new();
        if current.reminder_schedule_differs(&next) {
            if let Some(old) = &current.notification_ids {
                self.reminders.cancel_all(old).await;
            }
            fresh = self.reminders.schedule_for_habit(&next).await;
            next.notification_ids = stored_notification_ids(&next, current.notification_ids.as_ref(), fresh.clone());
        }

        let result = self
            .cache
            .mutate(
                |state| {
                    if let Some(slot) = state.habits.iter_mut().find(|h| h.id == next.id) {
                        *slot = next.clone();
                    }
                },
                self.storage.update_habit(&next),
            )
            .await;

        if let Err(err) = result {
            self.reminders.cancel_all(&fresh).await;
            return Err(err.into());
        }
        tracing::debug!("Updated habit {}", next.id);
        Ok(next)
    }

    /// Soft-delete a habit; its logs are kept
    pub async fn archive_habit(&self, habit_id: &HabitId) -> Result<(), StoreError> {
        let habit = self.require_habit(habit_id)?;

        self.cache
            .mutate(
                |state| state.habits.retain(|h| h.id != *habit_id),
                self.storage.archive_habit(habit_id),
            )
            .await?;

        if let Some(ids) = &habit.notification_ids {
            self.reminders.cancel_all(ids).await;
        }
        tracing::info!("Archived habit '{}' ({})", habit.name, habit.id);
        Ok(())
    }

    /// One-off nudge for a habit at `at`, outside its regular schedule
    ///
    /// The id is not kept on the habit; the reminder is consumed when it
    /// fires. `None` when `at` has passed or the platform refused.
    pub async fn remind_once(
        &self,
        habit_id: &HabitId,
        at: DateTime<Utc>,
    ) -> Result<Option<NotificationId>, StoreError> {
        let habit = self.require_habit(habit_id)?;
        if at <= Utc::now() {
            return Ok(None);
        }
        Ok(self.reminders.schedule_habit_once(&habit, at).await)
    }

    /// Log progress now; see [`HabitStore::log_habit_at`]
    pub async fn log_habit(
        &self,
        habit_id: &HabitId,
        value: u32,
        note: Option<String>,
        image_uri: Option<String>,
    ) -> Result<HabitLog, StoreError> {
        self.log_habit_at(habit_id, Utc::now(), value, note, image_uri).await
    }

    /// Log progress, clamped so the day's total never passes the target
    ///
    /// Rejected without any change when the target is already met for the
    /// local day of `timestamp`.
    pub async fn log_habit_at(
        &self,
        habit_id: &HabitId,
        timestamp: DateTime<Utc>,
        value: u32,
        note: Option<String>,
        image_uri: Option<String>,
    ) -> Result<HabitLog, StoreError> {
        let habit = self.require_habit(habit_id)?;
        let current = self.day_total(habit_id, local_date(&timestamp));
        if current >= habit.target_value {
            return Err(DomainError::DailyTargetReached {
                habit_id: habit.id,
                target: habit.target_value,
            }
            .into());
        }

        let remaining = habit.target_value - current;
        let log = HabitLog::new(habit.id.clone(), timestamp, value.min(remaining), note, image_uri)?;
        if log.value < value {
            tracing::debug!("Clamped log for {} from {} to {}", habit.id, value, log.value);
        }

        self.cache
            .mutate(|state| state.add_log(log.clone()), self.storage.insert_log(&log))
            .await?;
        Ok(log)
    }

    /// Edit a log's value or note; totals are adjusted, not recomputed
    pub async fn edit_log(&self, log_id: &LogId, patch: LogPatch) -> Result<HabitLog, StoreError> {
        let current = self
            .cache
            .read(|state| state.find_log(log_id).cloned())
            .ok_or_else(|| StorageError::LogNotFound {
                log_id: log_id.to_string(),
            })?;
        let next = current.patched(patch)?;

        self.cache
            .mutate(
                |state| state.replace_log(&current, next.clone()),
                self.storage.update_log(&next),
            )
            .await?;
        Ok(next)
    }

    pub async fn delete_log(&self, log_id: &LogId) -> Result<(), StoreError> {
        let log = self
            .cache
            .read(|state| state.find_log(log_id).cloned())
            .ok_or_else(|| StorageError::LogNotFound {
                log_id: log_id.to_string(),
            })?;

        self.cache
            .mutate(|state| state.remove_log(&log), self.storage.delete_log(log_id))
            .await?;
        tracing::debug!("Deleted log {}", log_id);
        Ok(())
    }
}
