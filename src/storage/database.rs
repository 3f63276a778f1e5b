/// Persistence engine: one shared SQLite connection
///
/// The connection is opened lazily on first use and reused afterwards.
/// Callers that arrive while it is being opened wait on the same lock and
/// then share the handle, so there is never a second connection. When an
/// operation fails with a transient error the handle is dropped, the engine
/// waits briefly, reopens, and retries that operation exactly once.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use rusqlite::Connection;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::storage::{migrations, StorageError};

/// Delay before reopening after a transient failure
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// SQLite-backed persistence engine
///
/// Construct once at startup and share by `Arc` with every store.
pub struct Database {
    path: PathBuf,
    conn: Mutex<Option<Connection>>,
    retry_delay: Duration,
    opens: AtomicU64,
    /// Attempts still to fail with `ConnectionClosed` before running
    #[cfg(test)]
    injected_failures: std::sync::atomic::AtomicUsize,
}

impl Database {
    /// Create the engine without touching the file system
    pub fn new(path: impl Into<PathBuf>, retry_delay: Duration) -> Self {
        Self {
            path: path.into(),
            conn: Mutex::new(None),
            retry_delay,
            opens: AtomicU64::new(0),
            #[cfg(test)]
            injected_failures: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.database_path.clone(), config.retry_delay)
    }

    /// Create the engine and open the connection immediately
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let db = Self::new(path, DEFAULT_RETRY_DELAY);
        db.run("open", |_| Ok(())).await?;
        Ok(db)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// How many times a connection has been opened over the engine's life
    pub fn open_count(&self) -> u64 {
        self.opens.load(Ordering::SeqCst)
    }

    /// Drop the cached handle; the next operation reopens it
    pub async fn reset(&self) {
        let mut guard = self.conn.lock().await;
        if guard.take().is_some() {
            tracing::debug!("Dropped database handle for {:?}", self.path);
        }
    }

    /// Run an operation against the shared connection
    ///
    /// The operation may run twice (once more after a transient failure), so
    /// it must not consume its captures.
    pub async fn run<T, F>(&self, op: &'static str, f: F) -> Result<T, StorageError>
    where
        F: Fn(&mut Connection) -> Result<T, StorageError> + Send + Sync,
        T: Send,
    {
        match self.attempt(&f).await {
            Err(err) if err.is_transient() => {
                tracing::warn!("Transient database failure during {}: {}; reconnecting", op, err);
                self.reset().await;
                tokio::time::sleep(self.retry_delay).await;
                self.attempt(&f).await
            }
            other => other,
        }
    }

    async fn attempt<T, F>(&self, f: &F) -> Result<T, StorageError>
    where
        F: Fn(&mut Connection) -> Result<T, StorageError> + Send + Sync,
        T: Send,
    {
        let mut guard = self.conn.lock().await;
        if guard.is_none() {
            *guard = Some(self.connect()?);
        }
        let conn = guard.as_mut().ok_or(StorageError::NullHandle)?;

        #[cfg(test)]
        if self
            .injected_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(StorageError::ConnectionClosed);
        }

        f(conn)
    }

    /// Make the next `count` attempts fail as if the handle had been reclaimed
    #[cfg(test)]
    pub(crate) fn fail_next_attempts(&self, count: usize) {
        self.injected_failures.store(count, Ordering::SeqCst);
    }

    fn connect(&self) -> Result<Connection, StorageError> {
        let conn = Connection::open(&self.path)
            .map_err(|e| StorageError::Connection(format!("Failed to open database: {}", e)))?;

        conn.busy_timeout(Duration::from_secs(5))
            .map_err(|e| StorageError::Connection(format!("Failed to set busy timeout: {}", e)))?;

        migrations::initialize_database(&conn)?;

        let generation = self.opens.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!("SQLite storage opened at {:?} (connection #{})", self.path, generation);
        Ok(conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn engine(dir: &tempfile::TempDir) -> Database {
        Database::new(dir.path().join("test.db"), Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_lazy_open() {
        let dir = tempdir().unwrap();
        let db = engine(&dir);
        assert_eq!(db.open_count(), 0);

        let one: i64 = db
            .run("ping", |conn| Ok(conn.query_row("SELECT 1", [], |row| row.get(0))?))
            .await
            .unwrap();
        assert_eq!(one, 1);
        assert_eq!(db.open_count(), 1);

        // Reused, not reopened
        db.run("ping", |_| Ok(())).await.unwrap();
        assert_eq!(db.open_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_initialization() {
        let dir = tempdir().unwrap();
        let db = Arc::new(engine(&dir));

        let calls = (0..8).map(|_| {
            let db = db.clone();
            async move { db.run("ping", |_| Ok(())).await }
        });
        let results = futures::future::join_all(calls).await;

        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(db.open_count(), 1);
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried_once() {
        let dir = tempdir().unwrap();
        let db = engine(&dir);
        let calls = AtomicUsize::new(0);

        let result = db
            .run("ping", |conn| {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    return Err(StorageError::ConnectionClosed);
                }
                Ok(conn.query_row("SELECT 42", [], |row| row.get::<_, i64>(0))?)
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        // The failed handle was dropped and a fresh one opened
        assert_eq!(db.open_count(), 2);
    }

    #[tokio::test]
    async fn test_second_transient_failure_propagates() {
        let dir = tempdir().unwrap();
        let db = engine(&dir);
        let calls = AtomicUsize::new(0);

        let result: Result<(), _> = db
            .run("ping", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(StorageError::NullHandle)
            })
            .await;

        assert!(matches!(result, Err(StorageError::NullHandle)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let dir = tempdir().unwrap();
        let db = engine(&dir);
        let calls = AtomicUsize::new(0);

        let result: Result<(), _> = db
            .run("ping", |conn| {
                calls.fetch_add(1, Ordering::SeqCst);
                conn.execute("INSERT INTO no_such_table VALUES (1)", [])?;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(StorageError::Query(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(db.open_count(), 1);
    }

    #[tokio::test]
    async fn test_open_failure_reports_connection_error() {
        let dir = tempdir().unwrap();
        let db = Database::new(dir.path().join("missing").join("nested").join("x.db"), Duration::from_millis(1));
        let result = db.run("ping", |_| Ok(())).await;
        assert!(matches!(result, Err(StorageError::Connection(_))));
    }
}
