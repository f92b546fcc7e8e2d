//! `DuckDB` connection handling.
//!
//! One root [`Connection`] is opened per warehouse; every pooled handle is
//! a `try_clone` of it, so all of them share a single database instance
//! and a write committed through one handle is immediately visible to the
//! others. Balance-scan workers insert concurrently, each on its own
//! handle.

use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use ::duckdb::Connection;

struct PoolState {
    root: Connection,
    idle: Vec<Connection>,
}

struct PoolInner {
    db_path: PathBuf,
    max_idle: usize,
    state: Mutex<PoolState>,
}

#[derive(Clone)]
pub struct DuckDbConnectionManager {
    inner: Arc<PoolInner>,
}

impl DuckDbConnectionManager {
    pub fn open(path: impl Into<PathBuf>, max_idle: usize) -> Result<Self, ::duckdb::Error> {
        let db_path = path.into();
        let root = Connection::open(&db_path)?;
        root.execute_batch("PRAGMA disable_progress_bar;")?;
        Ok(Self {
            inner: Arc::new(PoolInner {
                db_path,
                max_idle: max_idle.max(1),
                state: Mutex::new(PoolState {
                    root,
                    idle: Vec::new(),
                }),
            }),
        })
    }

    /// Take an idle handle, or clone a fresh one off the root connection.
    ///
    /// # Panics
    /// Panics if the pool mutex is poisoned.
    pub fn acquire(&self) -> Result<PooledConnection, ::duckdb::Error> {
        let mut state = self
            .inner
            .state
            .lock()
            .expect("duckdb connection pool mutex poisoned");
        let connection = match state.idle.pop() {
            Some(connection) => connection,
            None => state.root.try_clone()?,
        };
        drop(state);

        Ok(PooledConnection {
            pool: Arc::clone(&self.inner),
            connection: Some(connection),
        })
    }

    #[must_use]
    pub fn db_path(&self) -> &Path {
        self.inner.db_path.as_path()
    }
}

/// A pooled connection that returns to the idle set when dropped.
pub struct PooledConnection {
    pool: Arc<PoolInner>,
    connection: Option<Connection>,
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        self.connection
            .as_ref()
            .expect("pooled connection unexpectedly missing")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.connection
            .as_mut()
            .expect("pooled connection unexpectedly missing")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };

        // If the pool mutex is poisoned the connection is simply dropped;
        // panicking in Drop would abort an unwinding thread.
        let Ok(mut state) = self.pool.state.lock() else {
            return;
        };
        if state.idle.len() < self.pool.max_idle {
            state.idle.push(connection);
        }
    }
}
