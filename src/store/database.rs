//! Shared SQLite connection handle.
//!
//! The connection is opened lazily on first use and reused for the life of
//! the process. Concurrent first use still opens exactly one connection.
//! Queries run on tokio's blocking pool, never on an executor thread.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rusqlite::Connection;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info};

use crate::core::error::{RepoError, RepoResult};

use super::schema;

/// Default wait for a locked database before a call fails
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Where the database lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbLocation {
    /// On-disk database file
    File(PathBuf),

    /// Private in-memory database (tests, dry runs)
    Memory,
}

/// Lazily-initialized, process-wide connection
pub struct Database {
    location: DbLocation,
    busy_timeout: Duration,
    conn: OnceCell<Arc<Mutex<Connection>>>,
}

impl Database {
    /// Describe a database without connecting to it yet
    pub fn new(location: DbLocation, busy_timeout: Duration) -> Self {
        Self {
            location,
            busy_timeout,
            conn: OnceCell::new(),
        }
    }

    /// On-disk database with the default busy timeout
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self::new(DbLocation::File(path.as_ref().to_path_buf()), DEFAULT_BUSY_TIMEOUT)
    }

    /// In-memory database
    pub fn in_memory() -> Self {
        Self::new(DbLocation::Memory, DEFAULT_BUSY_TIMEOUT)
    }

    pub fn location(&self) -> &DbLocation {
        &self.location
    }

    /// Whether the connection has been opened yet
    pub fn is_connected(&self) -> bool {
        self.conn.initialized()
    }

    /// Run `f` with exclusive access to the connection.
    ///
    /// `f` runs on the blocking pool while the connection lock is held.
    pub async fn with_conn<F, T>(&self, f: F) -> RepoResult<T>
    where
        F: FnOnce(&mut Connection) -> RepoResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self
            .conn
            .get_or_try_init(|| async { self.connect().map(|c| Arc::new(Mutex::new(c))) })
            .await?;
        let mut guard = Arc::clone(conn).lock_owned().await;

        tokio::task::spawn_blocking(move || f(&mut *guard))
            .await
            .map_err(|e| RepoError::Storage(format!("Database task failed: {}", e)))?
    }

    fn connect(&self) -> RepoResult<Connection> {
        let conn = match &self.location {
            DbLocation::File(path) => {
                info!("Opening SQLite database at {}", path.display());

                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        RepoError::Storage(format!(
                            "Failed to create database directory {}: {}",
                            parent.display(),
                            e
                        ))
                    })?;
                }

                let conn = Connection::open(path)?;
                conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
                conn
            }
            DbLocation::Memory => {
                debug!("Opening in-memory SQLite database");
                Connection::open_in_memory()?
            }
        };

        conn.busy_timeout(self.busy_timeout)?;
        schema::init_schema(&conn)?;

        Ok(conn)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("location", &self.location)
            .field("busy_timeout", &self.busy_timeout)
            .field("connected", &self.is_connected())
            .finish()
    }
}
