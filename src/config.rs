/// Runtime configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::notify::FilterConfig;
use crate::storage::DEFAULT_RETRY_DELAY;

/// Notification channel reminders are posted to
pub const DEFAULT_CHANNEL: &str = "reminders";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database_path: PathBuf,
    /// Wait before reopening the database after a transient failure
    pub retry_delay: Duration,
    pub notification_channel: String,
    pub filter: FilterConfig,
}

impl Config {
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
            retry_delay: DEFAULT_RETRY_DELAY,
            notification_channel: DEFAULT_CHANNEL.to_string(),
            filter: FilterConfig::default(),
        }
    }
}

/// Default database location
///
/// Tries the home, data, and config directories, then the working
/// directory, keeping the first one that can be written to. Falls back to
/// the temp dir.
pub fn default_database_path() -> std::io::Result<PathBuf> {
    let candidates = [
        dirs::home_dir().map(|p| p.join(".habit_tracker")),
        dirs::data_dir().map(|p| p.join("habit_tracker")),
        dirs::config_dir().map(|p| p.join("habit_tracker")),
        std::env::current_dir().ok().map(|p| p.join(".habit_tracker")),
    ];

    for dir in candidates.iter().flatten() {
        if is_writable_dir(dir) {
            return Ok(dir.join("habits.db"));
        }
    }

    let temp = std::env::temp_dir().join("habit_tracker");
    std::fs::create_dir_all(&temp)?;
    tracing::warn!("Using temporary directory for database: {}", temp.display());
    Ok(temp.join("habits.db"))
}

fn is_writable_dir(dir: &Path) -> bool {
    if std::fs::create_dir_all(dir).is_err() {
        return false;
    }
    let marker = dir.join(".test_write");
    if std::fs::write(&marker, "test").is_err() {
        return false;
    }
    let _ = std::fs::remove_file(&marker);
    true
}
