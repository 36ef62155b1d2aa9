//! Shared SQLite handle for the collections.
//!
//! The studio is a single process with light write traffic, so one
//! connection behind a mutex is enough. A borrow holds the lock until it is
//! dropped, which makes a read-modify-write through one borrow atomic.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::Connection;

use crate::error::{Result, StorageError};
use crate::schema::run_migrations;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Cloneable handle to the store's one connection.
#[derive(Clone)]
pub struct ConnectionPool {
    conn: Arc<Mutex<Connection>>,
}

impl ConnectionPool {
    /// Open the store file at `path`, creating it when missing.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Self::prepare(conn)
    }

    /// Store that lives only as long as the process.
    pub fn in_memory() -> Result<Self> {
        Self::prepare(Connection::open_in_memory()?)
    }

    fn prepare(conn: Connection) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        run_migrations(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Lock the connection for the lifetime of the returned borrow.
    pub fn get(&self) -> Result<PooledConnection<'_>> {
        self.conn
            .lock()
            .map(PooledConnection)
            .map_err(|_| StorageError::Poisoned)
    }
}

/// Locked connection; derefs to [`Connection`].
pub struct PooledConnection<'a>(MutexGuard<'a, Connection>);

impl std::ops::Deref for PooledConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(pool: &ConnectionPool, table: &str) -> i64 {
        pool.get()
            .unwrap()
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_memory_store_starts_empty() {
        let pool = ConnectionPool::in_memory().unwrap();
        assert_eq!(count(&pool, "processes"), 0);
        assert_eq!(count(&pool, "users"), 0);
    }

    #[test]
    fn test_clones_see_each_others_writes() {
        let pool = ConnectionPool::in_memory().unwrap();
        let other = pool.clone();

        pool.get()
            .unwrap()
            .execute("INSERT INTO users (id, record) VALUES ('a', '{}')", [])
            .unwrap();

        assert_eq!(count(&other, "users"), 1);
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("studio.db");

        let pool = ConnectionPool::new(&path).unwrap();
        pool.get()
            .unwrap()
            .execute("INSERT INTO models (id, record) VALUES ('m', '{}')", [])
            .unwrap();
        drop(pool);

        assert_eq!(count(&ConnectionPool::new(&path).unwrap(), "models"), 1);
    }
}
