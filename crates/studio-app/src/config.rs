//! Environment configuration for external services.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use studio_core::{
    DisabledIdentity, FirebaseIdentity, GeminiClient, IdentityError, IdentityProvider, ImageApi,
    ImagingConfig, ImagingError,
};

/// Marker found in unconfigured identity keys.
const PLACEHOLDER_MARKER: &str = "PLACEHOLDER";

/// Errors building the external service clients.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("image API client: {0}")]
    Imaging(#[from] ImagingError),

    #[error("identity client: {0}")]
    Identity(#[from] IdentityError),
}

/// Settings read from the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvConfig {
    /// `API_KEY`, else `GEMINI_API_KEY`.
    pub api_key: Option<String>,
    /// `GEMINI_ENDPOINT`
    pub gemini_endpoint: Option<String>,
    /// `FIREBASE_API_KEY`
    pub firebase_api_key: Option<String>,
    /// `STUDIO_PUBLIC_URL`
    pub public_url: Option<String>,
}

impl EnvConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Self {
            api_key: var("API_KEY").or_else(|| var("GEMINI_API_KEY")),
            gemini_endpoint: var("GEMINI_ENDPOINT"),
            firebase_api_key: var("FIREBASE_API_KEY"),
            public_url: var("STUDIO_PUBLIC_URL"),
        }
    }

    /// Whether a usable identity provider key is configured.
    pub fn identity_enabled(&self) -> bool {
        self.firebase_api_key
            .as_deref()
            .is_some_and(|k| !k.contains(PLACEHOLDER_MARKER))
    }

    pub fn imaging_config(&self) -> ImagingConfig {
        let mut config = ImagingConfig {
            api_key: self.api_key.clone(),
            ..Default::default()
        };
        if let Some(ref endpoint) = self.gemini_endpoint {
            config.endpoint = endpoint.clone();
        }
        config
    }

    pub fn image_api(&self) -> Result<Arc<dyn ImageApi>, ConfigError> {
        if self.api_key.is_none() {
            warn!("No image API key configured, studio operations will fail");
        }
        Ok(Arc::new(GeminiClient::new(self.imaging_config())?))
    }

    /// The hosted identity provider, or the disabled stand-in that makes
    /// every account local.
    pub fn identity_provider(&self) -> Result<Arc<dyn IdentityProvider>, ConfigError> {
        let key = match self.firebase_api_key.as_deref() {
            Some(key) if self.identity_enabled() => key,
            _ => {
                info!("Identity provider disabled, accounts are local only");
                return Ok(Arc::new(DisabledIdentity));
            }
        };

        let mut provider = FirebaseIdentity::new(key)?;
        if let Some(ref url) = self.public_url {
            provider = provider.with_continue_url(url.clone());
        }
        Ok(Arc::new(provider))
    }
}
