/// Public library interface for the habit and todo data core
///
/// `HabitCore` is the wiring object: it owns the persistence engine and
/// hands it to both stores, so the whole process shares one connection.

use std::sync::Arc;

use thiserror::Error;

pub mod backup;
pub mod config;
pub mod deeplink;
pub mod domain;
pub mod notify;
pub mod storage;
pub mod store;

pub use backup::{Backup, BackupError};
pub use config::Config;
pub use deeplink::Tab;
pub use domain::*;
pub use notify::{DeliveryFilter, LocalScheduler, NotificationScheduler, Reminders};
pub use storage::{Database, Snapshot, Storage, StorageError};
pub use store::{HabitStore, StoreError, TodoStore, WidgetTheme};

/// Errors surfaced by `HabitCore`
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Backup error: {0}")]
    Backup(#[from] BackupError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub struct HabitCore {
    config: Config,
    database: Arc<Database>,
    reminders: Reminders,
    habits: HabitStore,
    todos: TodoStore,
}

impl HabitCore {
    /// Wire the engine and stores without opening anything
    pub fn new(config: Config, scheduler: Arc<dyn NotificationScheduler>) -> Self {
        let database = Arc::new(Database::from_config(&config));
        let reminders = Reminders::new(scheduler, config.notification_channel.clone());
        let storage: Arc<dyn Storage> = database.clone();

        Self {
            habits: HabitStore::new(storage.clone(), reminders.clone()),
            todos: TodoStore::new(storage, reminders.clone()),
            reminders,
            database,
            config,
        }
    }

    /// Wire everything, open the database and load both stores
    pub async fn open(config: Config, scheduler: Arc<dyn NotificationScheduler>) -> Result<Self, CoreError> {
        tracing::info!("Opening habit core with database: {:?}", config.database_path);
        let core = Self::new(config, scheduler);
        futures::try_join!(core.habits.fetch(false), core.todos.fetch(false))?;
        tracing::info!(
            "Loaded {} habits and {} todos",
            core.habits.habits().len(),
            core.todos.todos().len()
        );
        Ok(core)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.database
    }

    pub fn habits(&self) -> &HabitStore {
        &self.habits
    }

    pub fn todos(&self) -> &TodoStore {
        &self.todos
    }

    pub fn delivery_filter(&self) -> DeliveryFilter {
        DeliveryFilter::new(self.config.filter)
    }

    pub async fn export_backup(&self) -> Result<Backup, CoreError> {
        Ok(backup::export(&*self.database).await?)
    }

    /// Replace all data with a backup document, then reload both stores
    ///
    /// The document is fully validated first; a rejected file leaves
    /// storage, caches and scheduled reminders untouched. The returned
    /// backup carries the reminder ids scheduled for the restored rows.
    pub async fn import_backup(&self, text: &str) -> Result<Backup, CoreError> {
        let parsed = Backup::parse(text)?;
        let data = backup::import(&*self.database, &self.reminders, &parsed).await?;
        futures::try_join!(self.habits.fetch(true), self.todos.fetch(true))?;
        Ok(Backup { data, ..parsed })
    }

    pub async fn categories(&self) -> Result<Vec<String>, CoreError> {
        Ok(self.database.categories().await?)
    }

    pub async fn widget_theme(&self) -> Result<WidgetTheme, CoreError> {
        Ok(store::load_widget_theme(&*self.database).await?)
    }

    pub async fn set_widget_theme(&self, theme: WidgetTheme) -> Result<(), CoreError> {
        Ok(store::save_widget_theme(&*self.database, theme).await?)
    }
}
