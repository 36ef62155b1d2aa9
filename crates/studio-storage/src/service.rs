//! Data access facade.
//!
//! [`StudioService`] is the single entry point for settings, models, users,
//! the process log and session markers.
//!
//! ## Consistency
//!
//! - Settings and models are served from the [`StateCache`]. Mutations update
//!   the cache first and return a [`PendingWrite`] for the durable copy.
//! - Users and processes are read from the durable store on every call.
//! - When the durable store is unavailable the service keeps running on
//!   defaults: reads return defaults or nothing, writes are dropped with a
//!   warning. Callers never see a storage error.
//!
//! ## Example
//!
//! ```no_run
//! use studio_storage::{ServiceOptions, SettingsPatch, StudioService};
//!
//! # async fn demo() {
//! let service = StudioService::open(ServiceOptions::in_memory()).await;
//!
//! // Visible immediately; the durable write runs in the background.
//! let _ = service.update_settings(SettingsPatch {
//!     dark_mode: Some(true),
//!     ..Default::default()
//! });
//! assert!(service.get_settings().dark_mode);
//!
//! // Await the handle when durability matters.
//! service
//!     .update_settings(SettingsPatch::default())
//!     .await
//!     .unwrap();
//! # }
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Local;
use studio_core::{AuthManager, SessionToken};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::cache::StateCache;
use crate::database::{Database, DB_FILE_NAME};
use crate::error::Result;
use crate::local::{FileStore, LocalStore, MemoryStore};
use crate::models::{
    generate_id, AiProcess, ModelConfig, ModelPatch, NewProcess, ProcessOverview, Settings,
    SettingsPatch, User,
};
use crate::session::{AdminSession, SessionState};
use crate::write::PendingWrite;

/// File holding the session and guest markers.
pub const LOCAL_STATE_FILE: &str = "local_state.json";

/// Where the service keeps its data.
#[derive(Debug, Clone, Default)]
pub struct ServiceOptions {
    /// Data directory; the platform default when `None`.
    pub data_dir: Option<PathBuf>,
    /// Keep everything in memory.
    pub in_memory: bool,
}

impl ServiceOptions {
    pub fn in_memory() -> Self {
        Self {
            data_dir: None,
            in_memory: true,
        }
    }

    pub fn with_data_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: Some(dir.into()),
            in_memory: false,
        }
    }
}

struct ServiceInner {
    db: Option<Database>,
    cache: StateCache,
    session: SessionState,
    auth: AuthManager,
    ready: watch::Sender<bool>,
}

/// The data access facade.
#[derive(Clone)]
pub struct StudioService {
    inner: Arc<ServiceInner>,
}

impl std::fmt::Debug for StudioService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StudioService")
            .field("persistent", &self.inner.db.is_some())
            .field("ready", &self.is_ready())
            .field("cache", &self.inner.cache)
            .finish()
    }
}

/// Values read from the durable store at startup.
struct Loaded {
    settings: Settings,
    models: Vec<ModelConfig>,
    migrated_password: bool,
}

impl StudioService {
    /// Create a service serving defaults. Call [`initialize`](Self::initialize)
    /// to overlay the stored values.
    pub fn new(db: Option<Database>, local: Arc<dyn LocalStore>) -> Self {
        let (ready, _) = watch::channel(false);
        Self {
            inner: Arc::new(ServiceInner {
                db,
                cache: StateCache::new(),
                session: SessionState::new(local),
                auth: AuthManager::new(),
                ready,
            }),
        }
    }

    /// Open the stores described by `options` and load the cache.
    pub async fn open(options: ServiceOptions) -> Self {
        let (db, local) = match tokio::task::spawn_blocking(move || open_backends(&options)).await
        {
            Ok(backends) => backends,
            Err(e) => {
                warn!("Failed to open stores, running in memory: {}", e);
                (None, Arc::new(MemoryStore::new()) as Arc<dyn LocalStore>)
            }
        };

        let service = Self::new(db, local);
        service.initialize().await;
        service
    }

    /// Overlay stored settings and models onto the cache.
    ///
    /// Until this completes, readers observe the defaults.
    pub async fn initialize(&self) {
        if let Some(db) = self.inner.db.clone() {
            let auth = self.inner.auth.clone();
            match tokio::task::spawn_blocking(move || load(&db, &auth)).await {
                Ok(Ok(loaded)) => {
                    self.inner.cache.overlay(loaded.settings, loaded.models);
                    if loaded.migrated_password {
                        info!("Replacing legacy plaintext admin password with a hash");
                        if let Err(e) = self.persist_settings().await {
                            warn!("Failed to store migrated admin password: {}", e);
                        }
                    }
                }
                Ok(Err(e)) => warn!("Failed to load stored settings, using defaults: {}", e),
                Err(e) => warn!("Settings load task failed, using defaults: {}", e),
            }
        }

        self.inner.ready.send_replace(true);
        debug!("Studio service initialized");
    }

    /// Whether the stored values have been loaded.
    pub fn is_ready(&self) -> bool {
        *self.inner.ready.borrow()
    }

    /// Wait until [`initialize`](Self::initialize) has completed.
    pub async fn wait_ready(&self) {
        let mut rx = self.inner.ready.subscribe();
        let _ = rx.wait_for(|ready| *ready).await;
    }

    /// Whether a durable store is attached.
    pub fn is_persistent(&self) -> bool {
        self.inner.db.is_some()
    }

    // === Settings ===

    pub fn get_settings(&self) -> Settings {
        self.inner.cache.settings()
    }

    pub fn update_settings(&self, patch: SettingsPatch) -> PendingWrite {
        self.inner.cache.update_settings(patch);
        self.persist_settings()
    }

    /// Whether the admin console still needs its first-run setup. Only a
    /// missing password hash reopens setup.
    pub fn needs_setup(&self) -> bool {
        !self.inner.cache.settings().has_admin_password()
    }

    /// Validate, hash and store a new admin password.
    pub fn set_admin_password(&self, password: &str, confirmation: &str) -> Result<PendingWrite> {
        AuthManager::validate_new_password(password, confirmation)?;
        let hash = self.inner.auth.hash_password(password)?;
        self.inner.cache.set_password_hash(hash);
        info!("Admin password updated");
        Ok(self.persist_settings())
    }

    /// Check an input against the stored admin password hash.
    pub fn verify_password(&self, input: &str) -> bool {
        let settings = self.inner.cache.settings();
        self.inner
            .auth
            .matches(input, settings.admin_password_hash.as_deref())
    }

    // === Models ===

    pub fn get_models(&self) -> Vec<ModelConfig> {
        self.inner.cache.models()
    }

    /// Patch one model. Unknown ids change nothing and schedule no write.
    pub fn update_model(&self, id: &str, patch: ModelPatch) -> PendingWrite {
        if self.inner.cache.update_model(id, patch).is_none() {
            debug!(model = id, "Ignoring update for unknown model");
            return PendingWrite::skipped();
        }

        let Some(db) = self.inner.db.clone() else {
            return dropped_write("model");
        };
        let cache = self.inner.cache.clone();
        let id = id.to_string();
        PendingWrite::spawn(move || db.save_model_with(|| cache.model(&id)))
    }

    // === Users ===

    pub async fn get_all_users(&self) -> Vec<User> {
        self.read("users", |db| db.get_all_users())
            .await
            .unwrap_or_default()
    }

    /// Delete a user record and sign that user out of every client.
    /// Returns whether a stored record was removed.
    pub async fn delete_user(&self, id: &str) -> bool {
        let key = id.to_string();
        let deleted = self
            .read("delete user", move |db| db.delete_user(&key))
            .await
            .unwrap_or(false);

        let cleared = self.inner.session.clear_user_everywhere(id);
        if cleared > 0 {
            info!(user = id, clients = cleared, "Deleted user was signed in, clearing markers");
        }

        deleted
    }

    /// Create a local-only account and sign it in on `client`.
    pub async fn register_user_locally(&self, client: &SessionToken, name: &str, email: &str) -> User {
        let user = User::new(name, email);
        info!(user = %user.id, "Registering local user");
        self.mirror_remote_user(client, user).await
    }

    /// Store a user record and mark it as the current user of `client`.
    ///
    /// An existing record with the same id keeps its join date and role.
    pub async fn mirror_remote_user(&self, client: &SessionToken, user: User) -> User {
        let user = if self.inner.db.is_some() {
            let mut record = user.clone();
            self.read("save user", move |db| {
                if let Some(existing) = db.get_user(&record.id)? {
                    record.joined_at = existing.joined_at;
                    record.role = existing.role;
                }
                db.put_user(&record)?;
                Ok(record)
            })
            .await
            .unwrap_or(user)
        } else {
            warn!("Persistent store unavailable, user record not saved");
            user
        };

        self.inner.session.set_current_user(client, &user);
        user
    }

    pub fn get_current_user(&self, client: &SessionToken) -> Option<User> {
        self.inner.session.current_user(client)
    }

    pub fn logout_user(&self, client: &SessionToken) {
        self.inner.session.clear_current_user(client);
    }

    // === Processes ===

    /// Append a process to the log under a fresh id.
    pub fn log_process(&self, process: NewProcess) -> PendingWrite {
        let process = process.into_process(generate_id());
        debug!(id = %process.id, kind = ?process.process_type, status = ?process.status, "Logging process");

        let Some(db) = self.inner.db.clone() else {
            return dropped_write("process");
        };
        PendingWrite::spawn(move || db.insert_process(&process))
    }

    /// Every process, newest first.
    pub async fn get_all_processes(&self) -> Vec<AiProcess> {
        self.read("processes", |db| db.get_all_processes())
            .await
            .unwrap_or_default()
    }

    pub async fn process_overview(&self) -> ProcessOverview {
        let processes = self.get_all_processes().await;
        ProcessOverview::from_processes(&processes, Local::now())
    }

    // === Guest ===

    pub fn get_guest_action_count(&self, client: &SessionToken) -> u32 {
        self.inner.session.guest_action_count(client)
    }

    pub fn increment_guest_action_count(&self, client: &SessionToken) -> u32 {
        self.inner.session.increment_guest_action_count(client)
    }

    // === Admin session ===

    pub fn start_session(&self) -> AdminSession {
        self.inner.session.start_session()
    }

    pub fn end_session(&self, token: &SessionToken) {
        self.inner.session.end_session(token);
    }

    pub fn is_session_valid(&self, token: &SessionToken) -> bool {
        self.inner.session.is_session_valid(token)
    }

    pub fn session(&self) -> &SessionState {
        &self.inner.session
    }

    // === Internals ===

    fn persist_settings(&self) -> PendingWrite {
        let Some(db) = self.inner.db.clone() else {
            return dropped_write("settings");
        };
        let cache = self.inner.cache.clone();
        PendingWrite::spawn(move || db.save_settings_with(|| cache.settings()))
    }

    async fn read<T, F>(&self, what: &'static str, op: F) -> Option<T>
    where
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.inner.db.clone()?;
        match tokio::task::spawn_blocking(move || op(&db)).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                warn!(op = what, "Store access failed: {}", e);
                None
            }
            Err(e) => {
                warn!(op = what, "Store task failed: {}", e);
                None
            }
        }
    }
}

fn dropped_write(what: &'static str) -> PendingWrite {
    warn!(record = what, "Persistent store unavailable, write dropped");
    PendingWrite::skipped()
}

fn open_backends(options: &ServiceOptions) -> (Option<Database>, Arc<dyn LocalStore>) {
    if options.in_memory {
        let db = Database::in_memory()
            .map_err(|e| warn!("Failed to open in-memory store: {}", e))
            .ok();
        return (db, Arc::new(MemoryStore::new()));
    }

    let dir = match options.data_dir.clone() {
        Some(dir) => dir,
        None => match Database::default_data_dir() {
            Ok(dir) => dir,
            Err(e) => {
                warn!("No data directory, running in memory: {}", e);
                return (None, Arc::new(MemoryStore::new()));
            }
        },
    };

    let db = match Database::with_path(dir.join(DB_FILE_NAME)) {
        Ok(db) => Some(db),
        Err(e) => {
            warn!("Persistent store unavailable, running on defaults: {}", e);
            None
        }
    };

    (db, Arc::new(FileStore::open(dir.join(LOCAL_STATE_FILE))))
}

fn load(db: &Database, auth: &AuthManager) -> Result<Loaded> {
    let raw = db.load_settings_raw()?;
    let models = db.get_models()?;

    let (mut settings, legacy) = match raw {
        Some(value) => Settings::from_stored(&value),
        None => (Settings::default(), None),
    };

    let mut migrated_password = false;
    if let Some(plain) = legacy {
        if settings.admin_password_hash.is_none() {
            match auth.hash_password(&plain) {
                Ok(hash) => settings.admin_password_hash = Some(hash),
                Err(e) => warn!("Discarding unusable legacy admin password: {}", e),
            }
        }
        // Rewrite the record so the plaintext copy disappears either way.
        migrated_password = true;
    }

    Ok(Loaded {
        settings,
        models,
        migrated_password,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{default_models, ProcessStatus, ProcessType, SETTINGS_KEY};
    use crate::repository::Collection;
    use serde_json::json;

    async fn service_with(db: &Database) -> StudioService {
        let service = StudioService::new(Some(db.clone()), Arc::new(MemoryStore::new()));
        service.initialize().await;
        service
    }

    fn process_at(timestamp: i64) -> NewProcess {
        let mut p = NewProcess::now(None, ProcessType::Editing, ProcessStatus::Success, "m");
        p.timestamp = timestamp;
        p
    }

    // ==================== Settings ====================

    #[tokio::test]
    async fn test_stored_settings_merge_over_defaults() {
        let db = Database::in_memory().unwrap();
        db.put(
            Collection::Settings,
            SETTINGS_KEY,
            &json!({"id": "main_settings", "siteName": "X"}),
        )
        .unwrap();

        let service = service_with(&db).await;
        let settings = service.get_settings();

        assert_eq!(settings.site_name, "X");
        assert!(!settings.dark_mode);
        assert_eq!(settings.theme, Settings::default().theme);
    }

    #[tokio::test]
    async fn test_defaults_before_initialize() {
        let db = Database::in_memory().unwrap();
        db.put(Collection::Settings, SETTINGS_KEY, &json!({"siteName": "Stored"}))
            .unwrap();

        let service = StudioService::new(Some(db), Arc::new(MemoryStore::new()));
        assert!(!service.is_ready());
        assert_eq!(service.get_settings(), Settings::default());

        service.initialize().await;
        service.wait_ready().await;
        assert!(service.is_ready());
        assert_eq!(service.get_settings().site_name, "Stored");
    }

    #[tokio::test]
    async fn test_update_settings_visible_before_persist() {
        let db = Database::in_memory().unwrap();
        let service = service_with(&db).await;

        let write = service.update_settings(SettingsPatch {
            dark_mode: Some(true),
            ..Default::default()
        });
        assert!(service.get_settings().dark_mode);

        write.await.unwrap();
        let raw = db.load_settings_raw().unwrap().unwrap();
        assert_eq!(raw["darkMode"], true);
    }

    #[tokio::test]
    async fn test_fire_and_forget_writes_converge() {
        let db = Database::in_memory().unwrap();
        let service = service_with(&db).await;

        for i in 0..10 {
            let _ = service.update_settings(SettingsPatch {
                site_name: Some(format!("name-{i}")),
                ..Default::default()
            });
        }
        service
            .update_settings(SettingsPatch::default())
            .await
            .unwrap();

        let raw = db.load_settings_raw().unwrap().unwrap();
        assert_eq!(raw["siteName"], "name-9");
    }

    #[tokio::test]
    async fn test_settings_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let client = SessionToken::new();

        {
            let service = StudioService::open(ServiceOptions::with_data_dir(dir.path())).await;
            service
                .update_settings(SettingsPatch {
                    contact_phone: Some("+1 555".into()),
                    ..Default::default()
                })
                .await
                .unwrap();
            service.increment_guest_action_count(&client);
        }

        let service = StudioService::open(ServiceOptions::with_data_dir(dir.path())).await;
        assert_eq!(service.get_settings().contact_phone, "+1 555");
        assert_eq!(service.get_guest_action_count(&client), 1);
    }

    // ==================== Models ====================

    #[tokio::test]
    async fn test_seed_models_when_store_empty() {
        let db = Database::in_memory().unwrap();
        let service = service_with(&db).await;
        assert_eq!(service.get_models(), default_models());
    }

    #[tokio::test]
    async fn test_unknown_model_update_is_noop() {
        let db = Database::in_memory().unwrap();
        let service = service_with(&db).await;
        let before = service.get_models();

        service
            .update_model(
                "missing",
                ModelPatch {
                    enabled: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(service.get_models(), before);
        assert_eq!(db.count(Collection::Models).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_model_update_persists() {
        let db = Database::in_memory().unwrap();
        let service = service_with(&db).await;

        service
            .update_model(
                "gemini-3-pro-image-preview",
                ModelPatch {
                    enabled: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let reloaded = service_with(&db).await;
        let pro = reloaded
            .get_models()
            .into_iter()
            .find(|m| m.id == "gemini-3-pro-image-preview")
            .unwrap();
        assert!(!pro.enabled);
    }

    // ==================== Users ====================

    #[tokio::test]
    async fn test_register_round_trip() {
        let db = Database::in_memory().unwrap();
        let service = service_with(&db).await;

        let client = SessionToken::new();
        let user = service.register_user_locally(&client, "Ali", "ali@example.com").await;

        assert_eq!(user.id.len(), 9);
        assert_eq!(service.get_current_user(&client), Some(user.clone()));
        assert!(service.get_current_user(&SessionToken::new()).is_none());
        assert!(service.get_all_users().await.contains(&user));
    }

    #[tokio::test]
    async fn test_logout_clears_marker_only() {
        let db = Database::in_memory().unwrap();
        let service = service_with(&db).await;
        let client = SessionToken::new();
        service.register_user_locally(&client, "Ali", "ali@example.com").await;

        service.logout_user(&client);

        assert!(service.get_current_user(&client).is_none());
        assert_eq!(service.get_all_users().await.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_user_clears_matching_marker() {
        let db = Database::in_memory().unwrap();
        let service = service_with(&db).await;
        let (phone, laptop) = (SessionToken::new(), SessionToken::new());
        let ali = service.register_user_locally(&phone, "Ali", "ali@example.com").await;
        let sara = service.register_user_locally(&laptop, "Sara", "sara@example.com").await;

        assert!(service.delete_user(&ali.id).await);
        assert!(service.get_current_user(&phone).is_none());
        assert_eq!(service.get_current_user(&laptop), Some(sara.clone()));

        assert!(service.delete_user(&sara.id).await);
        assert!(service.get_current_user(&laptop).is_none());
        assert!(!service.delete_user("ghost").await);
    }

    #[tokio::test]
    async fn test_mirror_keeps_join_date() {
        let db = Database::in_memory().unwrap();
        let service = service_with(&db).await;
        let client = SessionToken::new();

        let mut first = User::with_id("remote-1", "Ali", "ali@example.com");
        first.joined_at = 1_000;
        service.mirror_remote_user(&client, first).await;

        let again = service
            .mirror_remote_user(&client, User::with_id("remote-1", "Ali H", "ali@example.com"))
            .await;

        assert_eq!(again.joined_at, 1_000);
        assert_eq!(again.name, "Ali H");
        assert_eq!(service.get_all_users().await.len(), 1);
        assert_eq!(service.get_current_user(&client), Some(again));
    }

    // ==================== Processes ====================

    #[tokio::test]
    async fn test_processes_newest_first() {
        let db = Database::in_memory().unwrap();
        let service = service_with(&db).await;

        for ts in [100, 50, 200] {
            service.log_process(process_at(ts)).await.unwrap();
        }

        let timestamps: Vec<i64> = service
            .get_all_processes()
            .await
            .iter()
            .map(|p| p.timestamp)
            .collect();
        assert_eq!(timestamps, vec![200, 100, 50]);
    }

    #[tokio::test]
    async fn test_log_process_assigns_ids() {
        let db = Database::in_memory().unwrap();
        let service = service_with(&db).await;

        service.log_process(process_at(1)).await.unwrap();
        service.log_process(process_at(1)).await.unwrap();

        let processes = service.get_all_processes().await;
        assert_eq!(processes.len(), 2);
        assert_ne!(processes[0].id, processes[1].id);
    }

    #[tokio::test]
    async fn test_overview() {
        let db = Database::in_memory().unwrap();
        let service = service_with(&db).await;
        service
            .log_process(NewProcess::now(
                None,
                ProcessType::Removal,
                ProcessStatus::Error,
                "m",
            ))
            .await
            .unwrap();

        let overview = service.process_overview().await;
        assert_eq!(overview.total, 1);
        assert_eq!(overview.failed, 1);
        assert_eq!(overview.by_type.removal, 1);
    }

    // ==================== Guest & Session ====================

    #[tokio::test]
    async fn test_guest_counter() {
        let service = StudioService::open(ServiceOptions::in_memory()).await;
        let (a, b) = (SessionToken::new(), SessionToken::new());
        assert_eq!(service.get_guest_action_count(&a), 0);
        assert_eq!(service.increment_guest_action_count(&a), 1);
        assert_eq!(service.increment_guest_action_count(&a), 2);
        assert_eq!(service.get_guest_action_count(&a), 2);
        assert_eq!(service.get_guest_action_count(&b), 0);
    }

    #[tokio::test]
    async fn test_admin_session() {
        let service = StudioService::open(ServiceOptions::in_memory()).await;
        let stranger = SessionToken::new();
        assert!(!service.is_session_valid(&stranger));

        let admin = service.start_session();
        assert!(service.is_session_valid(&admin.token));
        assert!(!service.is_session_valid(&stranger));
        assert!(!service
            .session()
            .is_session_valid_at(&admin.token, admin.expires_at));

        let admin = service.start_session();
        service.end_session(&admin.token);
        assert!(!service.is_session_valid(&admin.token));
    }

    // ==================== Password ====================

    #[tokio::test]
    async fn test_verify_without_password() {
        let service = StudioService::open(ServiceOptions::in_memory()).await;
        assert!(service.needs_setup());
        assert!(!service.verify_password(""));
        assert!(!service.verify_password("anything"));
    }

    #[tokio::test]
    async fn test_set_and_verify_password() {
        let db = Database::in_memory().unwrap();
        let service = service_with(&db).await;

        service
            .set_admin_password("s3cret", "s3cret")
            .unwrap()
            .await
            .unwrap();

        assert!(!service.needs_setup());
        assert!(service.verify_password("s3cret"));
        assert!(!service.verify_password("s3cre"));
        assert!(!service.verify_password("S3cret"));
        assert!(!service.verify_password(""));

        let raw = db.load_settings_raw().unwrap().unwrap();
        assert!(raw["adminPasswordHash"].as_str().unwrap().starts_with("$argon2"));
        assert_eq!(raw["isFirstRun"], false);
    }

    #[tokio::test]
    async fn test_set_password_rejects_short_or_mismatched() {
        let service = StudioService::open(ServiceOptions::in_memory()).await;
        assert!(service.set_admin_password("abc", "abc").is_err());
        assert!(service.set_admin_password("abcd", "abce").is_err());
        assert!(service.needs_setup());
    }

    #[tokio::test]
    async fn test_first_run_flag_cannot_reopen_setup() {
        let db = Database::in_memory().unwrap();
        let service = service_with(&db).await;
        service
            .set_admin_password("secret", "secret")
            .unwrap()
            .await
            .unwrap();

        db.put(
            Collection::Settings,
            SETTINGS_KEY,
            &json!({"adminPasswordHash": service.get_settings().admin_password_hash, "isFirstRun": true}),
        )
        .unwrap();
        let reloaded = service_with(&db).await;

        assert!(!reloaded.needs_setup());
        assert!(reloaded.verify_password("secret"));
    }

    #[tokio::test]
    async fn test_legacy_plaintext_password_is_hashed() {
        let db = Database::in_memory().unwrap();
        db.put(
            Collection::Settings,
            SETTINGS_KEY,
            &json!({"adminPassword": "1234", "isFirstRun": false}),
        )
        .unwrap();

        let service = service_with(&db).await;

        assert!(service.verify_password("1234"));
        assert!(!service.needs_setup());
        let raw = db.load_settings_raw().unwrap().unwrap();
        assert!(raw.get("adminPassword").is_none());
        assert!(raw.get("adminPasswordHash").is_some());
    }

    // ==================== Store unavailable ====================

    #[tokio::test]
    async fn test_runs_on_defaults_without_store() {
        let service = StudioService::new(None, Arc::new(MemoryStore::new()));
        service.initialize().await;

        assert!(!service.is_persistent());
        assert_eq!(service.get_settings(), Settings::default());

        service
            .update_settings(SettingsPatch {
                dark_mode: Some(true),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(service.get_settings().dark_mode);

        service.log_process(process_at(1)).await.unwrap();
        assert!(service.get_all_processes().await.is_empty());

        let client = SessionToken::new();
        let user = service.register_user_locally(&client, "Ali", "a@x.io").await;
        assert_eq!(service.get_current_user(&client), Some(user));
        assert!(service.get_all_users().await.is_empty());
    }
}
