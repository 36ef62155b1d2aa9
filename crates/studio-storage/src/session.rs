//! Per-client session and guest state.
//!
//! Every marker in the local store is scoped by a token:
//!
//! - `guest_action_count:<client>`: actions the client performed without an account
//! - `current_user:<client>`: the user signed in on that client, as JSON
//! - `admin_session:<token>`: absolute expiry of one admin session, epoch ms
//!
//! Admin sessions have no timer. A session is valid while `now < expiry`,
//! checked at call time; expired entries are removed when they are next
//! looked at or when another session starts.

use std::sync::Arc;

use studio_core::{SessionToken, ADMIN_SESSION_TTL};
use tracing::{debug, warn};

use crate::local::LocalStore;
use crate::models::{now_millis, User};

pub const GUEST_ACTION_COUNT_PREFIX: &str = "guest_action_count:";
pub const CURRENT_USER_PREFIX: &str = "current_user:";
pub const ADMIN_SESSION_PREFIX: &str = "admin_session:";

fn key(prefix: &str, token: &SessionToken) -> String {
    format!("{prefix}{token}")
}

/// A started admin session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminSession {
    pub token: SessionToken,
    /// Epoch milliseconds.
    pub expires_at: i64,
}

/// Accessor for the session markers.
#[derive(Clone)]
pub struct SessionState {
    store: Arc<dyn LocalStore>,
}

impl std::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionState")
            .field("signed_in_clients", &self.store.keys_with_prefix(CURRENT_USER_PREFIX).len())
            .field("admin_sessions", &self.store.keys_with_prefix(ADMIN_SESSION_PREFIX).len())
            .finish()
    }
}

impl SessionState {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store }
    }

    // === Guest ===

    /// Actions `client` performed as a guest. Missing or unparsable reads as 0.
    pub fn guest_action_count(&self, client: &SessionToken) -> u32 {
        self.store
            .get_item(&key(GUEST_ACTION_COUNT_PREFIX, client))
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }

    /// Increment the client's guest counter and return the new value.
    pub fn increment_guest_action_count(&self, client: &SessionToken) -> u32 {
        let next = self.guest_action_count(client).saturating_add(1);
        self.store
            .set_item(&key(GUEST_ACTION_COUNT_PREFIX, client), &next.to_string());
        next
    }

    // === Current user ===

    pub fn current_user(&self, client: &SessionToken) -> Option<User> {
        let raw = self.store.get_item(&key(CURRENT_USER_PREFIX, client))?;
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!("Ignoring unreadable current user marker: {}", e);
                None
            }
        }
    }

    pub fn set_current_user(&self, client: &SessionToken, user: &User) {
        match serde_json::to_string(user) {
            Ok(json) => self.store.set_item(&key(CURRENT_USER_PREFIX, client), &json),
            Err(e) => warn!("Failed to serialize current user: {}", e),
        }
    }

    pub fn clear_current_user(&self, client: &SessionToken) {
        self.store.remove_item(&key(CURRENT_USER_PREFIX, client));
    }

    /// Sign `user_id` out of every client. Returns how many markers were cleared.
    pub fn clear_user_everywhere(&self, user_id: &str) -> usize {
        let mut cleared = 0;
        for marker in self.store.keys_with_prefix(CURRENT_USER_PREFIX) {
            let names_user = self
                .store
                .get_item(&marker)
                .and_then(|raw| serde_json::from_str::<User>(&raw).ok())
                .is_some_and(|u| u.id == user_id);
            if names_user {
                self.store.remove_item(&marker);
                cleared += 1;
            }
        }
        cleared
    }

    // === Admin session ===

    /// Start an admin session expiring one hour after `now_ms`.
    pub fn start_session_at(&self, now_ms: i64) -> AdminSession {
        self.prune_sessions(now_ms);

        let session = AdminSession {
            token: SessionToken::new(),
            expires_at: now_ms + ADMIN_SESSION_TTL.as_millis() as i64,
        };
        self.store.set_item(
            &key(ADMIN_SESSION_PREFIX, &session.token),
            &session.expires_at.to_string(),
        );
        session
    }

    pub fn start_session(&self) -> AdminSession {
        self.start_session_at(now_millis())
    }

    /// End one admin session; others stay valid.
    pub fn end_session(&self, token: &SessionToken) {
        self.store.remove_item(&key(ADMIN_SESSION_PREFIX, token));
    }

    /// Absolute expiry of the session named by `token`, if it was started.
    pub fn session_expiry(&self, token: &SessionToken) -> Option<i64> {
        self.store
            .get_item(&key(ADMIN_SESSION_PREFIX, token))
            .and_then(|v| v.trim().parse().ok())
    }

    pub fn is_session_valid_at(&self, token: &SessionToken, now_ms: i64) -> bool {
        match self.session_expiry(token) {
            Some(expiry) if now_ms < expiry => true,
            Some(_) => {
                self.end_session(token);
                false
            }
            None => false,
        }
    }

    pub fn is_session_valid(&self, token: &SessionToken) -> bool {
        self.is_session_valid_at(token, now_millis())
    }

    fn prune_sessions(&self, now_ms: i64) {
        for entry in self.store.keys_with_prefix(ADMIN_SESSION_PREFIX) {
            let expired = self
                .store
                .get_item(&entry)
                .and_then(|v| v.trim().parse::<i64>().ok())
                .map_or(true, |expiry| now_ms >= expiry);
            if expired {
                debug!("Removing expired admin session");
                self.store.remove_item(&entry);
            }
        }
    }
}
