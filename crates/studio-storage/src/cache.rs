//! In-memory mirror of the settings record and model list.
//!
//! Reads are cheap snapshots. Writes are visible to every reader as soon as
//! the call returns; persistence is the caller's concern.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::models::{default_models, ModelConfig, ModelPatch, Settings, SettingsPatch};

#[derive(Debug)]
struct CacheInner {
    settings: Settings,
    models: Vec<ModelConfig>,
}

/// Shared settings/model cache.
#[derive(Clone)]
pub struct StateCache {
    inner: Arc<RwLock<CacheInner>>,
}

impl std::fmt::Debug for StateCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("StateCache")
            .field("site_name", &inner.settings.site_name)
            .field("models", &inner.models.len())
            .finish()
    }
}

impl Default for StateCache {
    fn default() -> Self {
        Self::new()
    }
}

impl StateCache {
    /// A cache holding the default settings and seed models.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(CacheInner {
                settings: Settings::default(),
                models: default_models(),
            })),
        }
    }

    /// Snapshot of the settings.
    pub fn settings(&self) -> Settings {
        self.inner.read().settings.clone()
    }

    /// Snapshot of the model list.
    pub fn models(&self) -> Vec<ModelConfig> {
        self.inner.read().models.clone()
    }

    pub fn model(&self, id: &str) -> Option<ModelConfig> {
        self.inner.read().models.iter().find(|m| m.id == id).cloned()
    }

    /// Merge a patch and return the new settings.
    pub fn update_settings(&self, patch: SettingsPatch) -> Settings {
        let mut inner = self.inner.write();
        patch.apply(&mut inner.settings);
        inner.settings.clone()
    }

    /// Replace the stored admin password hash.
    pub fn set_password_hash(&self, hash: String) -> Settings {
        let mut inner = self.inner.write();
        inner.settings.admin_password_hash = Some(hash);
        inner.settings.is_first_run = false;
        inner.settings.clone()
    }

    /// Patch one model. Returns `None` and changes nothing for an unknown id.
    pub fn update_model(&self, id: &str, patch: ModelPatch) -> Option<ModelConfig> {
        let mut inner = self.inner.write();
        let model = inner.models.iter_mut().find(|m| m.id == id)?;
        patch.apply(model);
        Some(model.clone())
    }

    /// Overlay values loaded from the durable store.
    ///
    /// An empty model list keeps the current one.
    pub fn overlay(&self, settings: Settings, models: Vec<ModelConfig>) {
        let mut inner = self.inner.write();
        inner.settings = settings;
        if !models.is_empty() {
            inner.models = models;
        }
    }
}
