//! Application state for the API server.

use std::sync::Arc;

use studio_core::identity::IdentityProvider;
use studio_core::imaging::{ImageApi, ImageStudio};
use studio_storage::{ServiceOptions, StudioService};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Data access facade.
    pub service: StudioService,
    /// Image operations.
    pub images: ImageStudio,
    /// Hosted account service (or the disabled stand-in).
    pub identity: Arc<dyn IdentityProvider>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("service", &self.service)
            .finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(
        service: StudioService,
        api: Arc<dyn ImageApi>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            service,
            images: ImageStudio::new(api),
            identity,
        }
    }

    /// State backed by an in-memory service.
    pub async fn in_memory(api: Arc<dyn ImageApi>, identity: Arc<dyn IdentityProvider>) -> Self {
        let service = StudioService::open(ServiceOptions::in_memory()).await;
        Self::new(service, api, identity)
    }
}
