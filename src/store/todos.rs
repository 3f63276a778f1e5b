/// Todo aggregate: cached todos, auto-postpone and reminder upkeep

use std::sync::Arc;

use chrono::{NaiveDate, Utc};

use crate::domain::{today, NewTodo, Todo, TodoId, TodoPatch};
use crate::notify::Reminders;
use crate::storage::{Storage, StorageError};
use crate::store::{todo_widget_items, OptimisticCache, StoreError, TodoWidgetItem};

#[derive(Debug, Clone, Default)]
struct TodoState {
    loaded: bool,
    /// Newest first
    todos: Vec<Todo>,
}

pub struct TodoStore {
    storage: Arc<dyn Storage>,
    reminders: Reminders,
    cache: OptimisticCache<TodoState>,
}

impl TodoStore {
    pub fn new(storage: Arc<dyn Storage>, reminders: Reminders) -> Self {
        Self {
            storage,
            reminders,
            cache: OptimisticCache::new(TodoState::default()),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.cache.read(|state| state.loaded)
    }

    pub async fn fetch(&self, force: bool) -> Result<(), StoreError> {
        self.fetch_on(force, today()).await
    }

    /// Load todos, moving overdue auto-postpone ones onto `today`
    ///
    /// Postponed due dates are written back before the cache is replaced, so
    /// callers never see a stale due date.
    pub async fn fetch_on(&self, force: bool, today: NaiveDate) -> Result<(), StoreError> {
        if self.is_loaded() && !force {
            return Ok(());
        }

        let mut todos = self.storage.todos().await?;
        for todo in todos.iter_mut().filter(|t| t.needs_postpone(today)) {
            todo.due_date = Some(todo.postponed_due_date(today));
            self.storage.update_todo(todo).await?;
            tracing::info!("Postponed todo {} to {}", todo.id, today);
        }

        tracing::debug!("Loaded {} todos", todos.len());
        self.cache.replace(TodoState { loaded: true, todos });
        Ok(())
    }

    pub fn todos(&self) -> Vec<Todo> {
        self.cache.read(|state| state.todos.clone())
    }

    pub fn todo(&self, todo_id: &TodoId) -> Option<Todo> {
        self.cache
            .read(|state| state.todos.iter().find(|t| t.id == *todo_id).cloned())
    }

    fn require_todo(&self, todo_id: &TodoId) -> Result<Todo, StoreError> {
        self.todo(todo_id).ok_or_else(|| {
            StorageError::TodoNotFound {
                todo_id: todo_id.to_string(),
            }
            .into()
        })
    }

    pub fn widget_items(&self, today: NaiveDate) -> Vec<TodoWidgetItem> {
        self.cache.read(|state| todo_widget_items(&state.todos, today))
    }

    pub async fn add_todo(&self, draft: NewTodo) -> Result<Todo, StoreError> {
        let mut todo = Todo::new(draft)?;
        todo.notification_id = self.reminders.schedule_for_todo(&todo, Utc::now()).await;

        let result = self
            .cache
            .mutate(|state| state.todos.insert(0, todo.clone()), self.storage.insert_todo(&todo))
            .await;

        if let Err(err) = result {
            if let Some(id) = &todo.notification_id {
                self.reminders.cancel(id).await;
            }
            return Err(err.into());
        }
        tracing::debug!("Added todo {}", todo.id);
        Ok(todo)
    }

    /// Edit a todo, replacing its reminder when the time or text changed
    ///
    /// Scheduled reminders cannot be edited in place, so a text change on a
    /// todo with a future reminder cancels and reschedules it.
    pub async fn update_todo(&self, todo_id: &TodoId, patch: TodoPatch) -> Result<Todo, StoreError> {
        let current = self.require_todo(todo_id)?;
        let mut next = current.patched(patch)?;
        let now = Utc::now();

        let reschedule = current.reminder_time != next.reminder_time
            || (current.content != next.content && current.has_pending_reminder(now));
        let mut fresh = None;
        if reschedule {
            if let Some(old) = &current.notification_id {
                self.reminders.cancel(old).await;
            }
            if !next.is_completed {
                fresh = self.reminders.schedule_for_todo(&next, now).await;
            }
            next.notification_id = fresh.clone();
        }

        let result = self
            .cache
            .mutate(
                |state| {
                    if let Some(slot) = state.todos.iter_mut().find(|t| t.id == next.id) {
                        *slot = next.clone();
                    }
                },
                self.storage.update_todo(&next),
            )
            .await;

        if let Err(err) = result {
            if let Some(id) = &fresh {
                self.reminders.cancel(id).await;
            }
            return Err(err.into());
        }
        Ok(next)
    }

    /// Mark a todo done or not done
    ///
    /// Completing cancels the pending reminder once the change is stored; the
    /// stored id is left as is.
    pub async fn set_completed(&self, todo_id: &TodoId, completed: bool) -> Result<Todo, StoreError> {
        let mut next = self.require_todo(todo_id)?;
        next.set_completed(completed, Utc::now());

        self.cache
            .mutate(
                |state| {
                    if let Some(slot) = state.todos.iter_mut().find(|t| t.id == next.id) {
                        *slot = next.clone();
                    }
                },
                self.storage.update_todo(&next),
            )
            .await?;

        if completed {
            if let Some(id) = &next.notification_id {
                self.reminders.cancel(id).await;
            }
        }
        tracing::debug!("Todo {} completed={}", next.id, completed);
        Ok(next)
    }

    pub async fn delete_todo(&self, todo_id: &TodoId) -> Result<(), StoreError> {
        let todo = self.require_todo(todo_id)?;

        self.cache
            .mutate(
                |state| state.todos.retain(|t| t.id != *todo_id),
                self.storage.delete_todo(todo_id),
            )
            .await?;

        if let Some(id) = &todo.notification_id {
            self.reminders.cancel(id).await;
        }
        tracing::debug!("Deleted todo {}", todo_id);
        Ok(())
    }

    pub async fn categories(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.storage.categories().await?)
    }

    pub async fn ensure_categories(&self, names: &[String]) -> Result<(), StoreError> {
        Ok(self.storage.ensure_categories(names).await?)
    }
}
