use super::{ConditionalStore, InsertOutcome, Provision, TABLE_NAME};
use crate::{AppId, StoreError};
use chrono::DateTime;
use core::time::Duration;
use parking_lot::Mutex;
use rusqlite::{Connection, ErrorCode, OptionalExtension, params};
use std::path::Path;
use std::sync::Arc;

/// SQLite backed store.
///
/// The conditional insert is a single `INSERT ... ON CONFLICT(id) DO NOTHING`
/// statement; the number of affected rows tells whether it was applied. Calls
/// run on the blocking pool and every operation is bounded by `timeout`.
///
/// A timed-out operation is reported as [`StoreError::Timeout`]. SQLite's busy
/// handler waits for the same bound, so a lock still held when it gives up is
/// a timeout too. The blocking call may still complete after the bound, so a
/// timed-out insert may have been written; callers must not read it as a
/// conflict.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    timeout: Duration,
}

impl SqliteStore {
    /// Opens (or creates) the database file at `path`.
    pub fn open(path: impl AsRef<Path>, timeout: Duration) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref()).map_err(|e| map_sqlite_error("open", e))?;
        Self::from_connection(conn, timeout)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory(timeout: Duration) -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|e| map_sqlite_error("open", e))?;
        Self::from_connection(conn, timeout)
    }

    fn from_connection(conn: Connection, timeout: Duration) -> Result<Self, StoreError> {
        conn.busy_timeout(timeout)
            .map_err(|e| map_sqlite_error("configure", e))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            timeout,
        })
    }

    /// Loads a stored row.
    pub async fn get(&self, id: &str) -> Result<Option<AppId>, StoreError> {
        let id = id.to_owned();
        let row = self
            .run("get", move |conn| {
                conn.query_row(
                    &format!(
                        "SELECT id, createdBy, createdOn, isGenerated FROM {TABLE_NAME} WHERE id = ?1"
                    ),
                    params![id],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, i64>(2)?,
                            row.get::<_, bool>(3)?,
                        ))
                    },
                )
                .optional()
            })
            .await?;

        row.map(|(id, created_by, created_on, is_generated)| {
            let created_on =
                DateTime::from_timestamp_millis(created_on).ok_or_else(|| StoreError::Backend {
                    context: format!("row {id} has an out of range createdOn ({created_on})"),
                })?;
            Ok(AppId::from_parts(id, created_by, created_on, is_generated))
        })
        .transpose()
    }

    /// Number of stored rows.
    pub async fn count(&self) -> Result<u64, StoreError> {
        self.run("count", |conn| {
            conn.query_row(&format!("SELECT COUNT(*) FROM {TABLE_NAME}"), [], |row| {
                row.get::<_, i64>(0)
            })
        })
        .await
        .map(|n| u64::try_from(n).unwrap_or_default())
    }

    async fn run<T, F>(&self, operation: &'static str, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let task = tokio::task::spawn_blocking(move || {
            let guard = conn.lock();
            f(&guard)
        });

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result.map_err(|e| match e.sqlite_error_code() {
                Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => {
                    self.timed_out(operation)
                }
                _ => map_sqlite_error(operation, e),
            }),
            Ok(Err(join_err)) => Err(StoreError::Unavailable {
                context: format!("{operation} task failed: {join_err}"),
            }),
            Err(_) => Err(self.timed_out(operation)),
        }
    }

    fn timed_out(&self, operation: &'static str) -> StoreError {
        StoreError::Timeout {
            operation,
            timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

fn map_sqlite_error(operation: &'static str, err: rusqlite::Error) -> StoreError {
    match err.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked | ErrorCode::CannotOpen) => {
            StoreError::Unavailable {
                context: format!("{operation}: {err}"),
            }
        }
        _ => StoreError::Backend {
            context: format!("{operation}: {err}"),
        },
    }
}

impl ConditionalStore for SqliteStore {
    async fn insert_if_absent(&self, record: &AppId) -> Result<InsertOutcome, StoreError> {
        let id = record.id().to_owned();
        let created_by = record.created_by().to_owned();
        let created_on = record.created_on().timestamp_millis();
        let is_generated = record.is_generated();

        let changed = self
            .run("insert_if_absent", move |conn| {
                conn.execute(
                    &format!(
                        "INSERT INTO {TABLE_NAME} (id, createdBy, createdOn, isGenerated) \
                         VALUES (?1, ?2, ?3, ?4) ON CONFLICT(id) DO NOTHING"
                    ),
                    params![id, created_by, created_on, is_generated],
                )
            })
            .await?;

        Ok(if changed == 0 {
            InsertOutcome::AlreadyExists
        } else {
            InsertOutcome::Applied
        })
    }

    async fn exists(&self, id: &str) -> Result<bool, StoreError> {
        let id = id.to_owned();
        self.run("exists", move |conn| {
            conn.query_row(
                &format!("SELECT 1 FROM {TABLE_NAME} WHERE id = ?1 LIMIT 1"),
                params![id],
                |_| Ok(()),
            )
            .optional()
            .map(|row| row.is_some())
        })
        .await
    }
}

impl Provision for SqliteStore {
    async fn create_table(&self) -> Result<(), StoreError> {
        self.run("create_table", |conn| {
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {TABLE_NAME} (
                    id TEXT PRIMARY KEY NOT NULL,
                    createdBy TEXT NOT NULL,
                    createdOn INTEGER NOT NULL,
                    isGenerated INTEGER NOT NULL
                )"
            ))
        })
        .await?;

        tracing::trace!("Table \"{TABLE_NAME}\" was created or already exists");
        Ok(())
    }

    async fn drop_table(&self) -> Result<(), StoreError> {
        self.run("drop_table", |conn| {
            conn.execute_batch(&format!("DROP TABLE IF EXISTS {TABLE_NAME}"))
        })
        .await?;

        tracing::trace!("Table \"{TABLE_NAME}\" was dropped");
        Ok(())
    }

    async fn truncate(&self) -> Result<(), StoreError> {
        self.run("truncate", |conn| {
            conn.execute(&format!("DELETE FROM {TABLE_NAME}"), [])
        })
        .await
        .map(|_| ())
    }
}
