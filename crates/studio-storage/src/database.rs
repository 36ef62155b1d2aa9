//! High-level database interface.

use std::path::PathBuf;

use directories::ProjectDirs;
use tracing::info;

use crate::error::{Result, StorageError};
use crate::models::{AiProcess, ModelConfig, Settings, User, SETTINGS_KEY};
use crate::pool::ConnectionPool;
use crate::repository::{Collection, CollectionRepo};

/// Database file name inside the data directory.
pub const DB_FILE_NAME: &str = "studio.db";

/// Durable store holding the four collections.
#[derive(Clone)]
pub struct Database {
    pool: ConnectionPool,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

impl Database {
    /// Open the database in the default app data directory.
    pub fn new() -> Result<Self> {
        Self::with_path(Self::default_data_dir()?.join(DB_FILE_NAME))
    }

    /// Open the database at a specific path.
    pub fn with_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        info!("Opening database at: {:?}", path);
        let pool = ConnectionPool::new(&path)?;

        Ok(Self { pool })
    }

    /// Create an in-memory database.
    pub fn in_memory() -> Result<Self> {
        let pool = ConnectionPool::in_memory()?;
        Ok(Self { pool })
    }

    /// Default data directory for the database, local state and logs.
    pub fn default_data_dir() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "nanobanana", "studio")
            .ok_or_else(|| StorageError::DataDir("could not determine app data directory".into()))?;

        Ok(proj_dirs.data_dir().to_path_buf())
    }

    // === Raw collection access ===

    pub fn get(&self, collection: Collection, key: &str) -> Result<Option<serde_json::Value>> {
        let conn = self.pool.get()?;
        CollectionRepo::get_raw(&conn, collection, key)
    }

    pub fn get_all(&self, collection: Collection) -> Result<Vec<serde_json::Value>> {
        let conn = self.pool.get()?;
        CollectionRepo::get_all_raw(&conn, collection)
    }

    pub fn put(&self, collection: Collection, key: &str, record: &serde_json::Value) -> Result<()> {
        let conn = self.pool.get()?;
        CollectionRepo::put_raw(&conn, collection, key, record)
    }

    pub fn delete(&self, collection: Collection, key: &str) -> Result<bool> {
        let conn = self.pool.get()?;
        CollectionRepo::delete(&conn, collection, key)
    }

    // === Settings ===

    /// The stored settings record as written, before merging with defaults.
    pub fn load_settings_raw(&self) -> Result<Option<serde_json::Value>> {
        self.get(Collection::Settings, SETTINGS_KEY)
    }

    /// Persist the settings produced by `snapshot`.
    ///
    /// `snapshot` runs while the connection is held, so concurrent saves
    /// always end with the latest snapshot on disk.
    pub fn save_settings_with<F>(&self, snapshot: F) -> Result<()>
    where
        F: FnOnce() -> Settings,
    {
        let conn = self.pool.get()?;
        let value = serde_json::to_value(snapshot())?;
        CollectionRepo::put_raw(&conn, Collection::Settings, SETTINGS_KEY, &value)
    }

    // === Models ===

    pub fn get_models(&self) -> Result<Vec<ModelConfig>> {
        let conn = self.pool.get()?;
        CollectionRepo::get_all(&conn)
    }

    /// Persist the model produced by `snapshot`, if any.
    pub fn save_model_with<F>(&self, snapshot: F) -> Result<()>
    where
        F: FnOnce() -> Option<ModelConfig>,
    {
        let conn = self.pool.get()?;
        match snapshot() {
            Some(model) => CollectionRepo::put(&conn, &model),
            None => Ok(()),
        }
    }

    // === Users ===

    pub fn get_all_users(&self) -> Result<Vec<User>> {
        let conn = self.pool.get()?;
        CollectionRepo::get_all(&conn)
    }

    pub fn get_user(&self, id: &str) -> Result<Option<User>> {
        let conn = self.pool.get()?;
        CollectionRepo::get(&conn, id)
    }

    pub fn put_user(&self, user: &User) -> Result<()> {
        let conn = self.pool.get()?;
        CollectionRepo::put(&conn, user)
    }

    pub fn delete_user(&self, id: &str) -> Result<bool> {
        self.delete(Collection::Users, id)
    }

    // === Processes ===

    pub fn insert_process(&self, process: &AiProcess) -> Result<()> {
        let conn = self.pool.get()?;
        CollectionRepo::put(&conn, process)
    }

    /// Every process, newest first.
    pub fn get_all_processes(&self) -> Result<Vec<AiProcess>> {
        let conn = self.pool.get()?;
        let mut processes: Vec<AiProcess> = CollectionRepo::get_all(&conn)?;
        processes.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(processes)
    }

    pub fn count(&self, collection: Collection) -> Result<i64> {
        let conn = self.pool.get()?;
        CollectionRepo::count(&conn, collection)
    }
}
