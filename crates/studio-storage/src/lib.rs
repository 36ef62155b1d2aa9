//! Studio Storage - persistence layer and data access facade.
//!
//! This crate holds everything the studio remembers:
//!
//! - Settings and model list, cached in memory and persisted to SQLite
//! - Users and the AI process log (SQLite)
//! - Per-client guest counters and current users, admin sessions (small local KV file)
//!
//! [`StudioService`] is the entry point; the lower layers are public for
//! tooling and tests.
//!
//! # Example
//!
//! ```no_run
//! use studio_core::SessionToken;
//! use studio_storage::{NewProcess, ProcessStatus, ProcessType, ServiceOptions, StudioService};
//!
//! # async fn demo() {
//! let service = StudioService::open(ServiceOptions::in_memory()).await;
//!
//! let client = SessionToken::new();
//! let user = service.register_user_locally(&client, "Ali", "ali@example.com").await;
//! let _ = service.log_process(NewProcess::now(
//!     Some(&user),
//!     ProcessType::Generation,
//!     ProcessStatus::Success,
//!     "gemini-2.5-flash-image",
//! ));
//! # }
//! ```

mod cache;
mod database;
pub mod error;
pub mod local;
pub mod models;
mod pool;
pub mod repository;
mod schema;
mod service;
pub mod session;
mod write;

pub use cache::StateCache;
pub use database::{Database, DB_FILE_NAME};
pub use error::{Result, StorageError};
pub use local::{FileStore, LocalStore, MemoryStore};
pub use models::{
    AiProcess, ExportFormat, ModelConfig, ModelPatch, NewProcess, ProcessOverview, ProcessStatus,
    ProcessType, ServiceItem, Settings, SettingsPatch, ThemeConfig, User, UserRole,
    GUEST_ACTION_LIMIT,
};
pub use pool::ConnectionPool;
pub use service::{ServiceOptions, StudioService, LOCAL_STATE_FILE};
pub use session::{AdminSession, SessionState};
pub use write::PendingWrite;
