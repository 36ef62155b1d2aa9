//! Storage error types.
//!
//! These never reach [`StudioService`](crate::StudioService) callers except
//! through an awaited [`PendingWrite`](crate::PendingWrite) or an admin
//! password change.

use thiserror::Error;

/// Errors raised by the durable store and its write tasks.
#[derive(Debug, Error)]
pub enum StorageError {
    /// SQLite rejected a statement or could not open the file.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A stored record could not be encoded or decoded.
    #[error("Record encoding error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem error while preparing the data directory.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The platform offers no application data directory.
    #[error("No data directory: {0}")]
    DataDir(String),

    /// A thread panicked while holding the connection.
    #[error("Connection lock poisoned")]
    Poisoned,

    /// Admin password rejected or could not be hashed.
    #[error("Auth error: {0}")]
    Auth(#[from] studio_core::AuthError),

    /// A background write task panicked or was cancelled.
    #[error("Write task failed: {0}")]
    Task(String),
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
