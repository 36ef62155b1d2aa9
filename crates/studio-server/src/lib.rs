//! Studio Server - HTTP API server.
//!
//! This crate exposes the studio over HTTP.
//!
//! ## Endpoints
//!
//! - `GET /api/site` - Public settings and enabled models
//! - `PUT /api/preferences` - Visitor preferences (when allowed)
//! - `GET /api/me` - Current user and guest allowance
//! - `POST /api/account/{register,login,forgot,logout}` - Account flow
//! - `POST /api/studio/{edit,enhance,remove-background,generate}` - Image operations
//! - `/api/admin/*` - Admin console (session required except status, setup and login)
//!
//! ## Identities
//!
//! Each visitor is told its client token in the `x-studio-client` response
//! header and sends it back on later requests; the signed-in user and the
//! guest allowance belong to that token. Admin setup and login return a
//! session token that admin routes expect as `Authorization: Bearer <token>`.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use studio_core::{DisabledIdentity, GeminiClient, ImagingConfig};
//! use studio_server::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let api = Arc::new(GeminiClient::new(ImagingConfig::default()).unwrap());
//!     let server = Server::new(ServerConfig::in_memory(), api, Arc::new(DisabledIdentity))
//!         .await
//!         .unwrap();
//!     server.run().await.unwrap();
//! }
//! ```

mod accounts;
pub mod error;
mod handlers;
pub mod models;
mod session;
pub mod state;
mod studio;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::HeaderName;
use axum::middleware;
use axum::routing::{delete, get, post, put};
use axum::Router;
use socket2::{Domain, Protocol, Socket, Type};
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use studio_core::{IdentityProvider, ImageApi};
use studio_storage::{ServiceOptions, StudioService};

pub use error::{ApiError, Result};
pub use session::CLIENT_HEADER;
pub use state::AppState;

pub const DEFAULT_PORT: u16 = 8787;
pub const DEFAULT_HOST: &str = "127.0.0.1";

const LISTEN_BACKLOG: i32 = 128;

/// Where to listen and where to keep data.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Where the studio keeps its data.
    pub storage: ServiceOptions,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            storage: ServiceOptions::default(),
        }
    }
}

impl ServerConfig {
    /// Nothing is written to disk.
    pub fn in_memory() -> Self {
        Self {
            storage: ServiceOptions::in_memory(),
            ..Default::default()
        }
    }

    /// Database and local state under `dir`.
    pub fn with_data_dir(dir: impl Into<std::path::PathBuf>) -> Self {
        Self {
            storage: ServiceOptions::with_data_dir(dir),
            ..Default::default()
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(self, port: u16) -> Self {
        Self { port, ..self }
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("cannot listen on {0}: {1}")]
    BindError(SocketAddr, std::io::Error),

    /// Bad address or a failure while serving.
    #[error("studio server failed: {0}")]
    Runtime(String),
}

/// Build the API router over `state`.
pub fn build_router(state: AppState) -> Router {
    let client_header = HeaderName::from_static(CLIENT_HEADER);
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, client_header.clone()])
        .expose_headers([client_header]);

    Router::new()
        // Public
        .route("/api/site", get(handlers::get_site))
        .route("/api/preferences", put(handlers::update_preferences))
        .route("/api/me", get(handlers::get_me))
        // Accounts
        .route("/api/account/register", post(accounts::register))
        .route("/api/account/login", post(accounts::login))
        .route("/api/account/forgot", post(accounts::forgot_password))
        .route("/api/account/logout", post(accounts::logout))
        // Studio
        .route("/api/studio/edit", post(studio::edit))
        .route("/api/studio/enhance", post(studio::enhance))
        .route("/api/studio/remove-background", post(studio::remove_background))
        .route("/api/studio/generate", post(studio::generate))
        // Admin
        .route("/api/admin/status", get(handlers::admin_status))
        .route("/api/admin/setup", post(handlers::admin_setup))
        .route("/api/admin/login", post(handlers::admin_login))
        .route("/api/admin/logout", post(handlers::admin_logout))
        .route("/api/admin/password", post(handlers::change_password))
        .route("/api/admin/test-key", post(handlers::test_api_key))
        .route(
            "/api/admin/settings",
            get(handlers::get_settings).put(handlers::update_settings),
        )
        .route("/api/admin/models", get(handlers::get_models))
        .route("/api/admin/models/{id}", put(handlers::update_model))
        .route("/api/admin/users", get(handlers::get_users))
        .route("/api/admin/users/{id}", delete(handlers::delete_user))
        .route("/api/admin/processes", get(handlers::get_processes))
        .route("/api/admin/overview", get(handlers::get_overview))
        .layer(middleware::from_fn(session::assign_client))
        .layer(cors)
        .with_state(state)
}

/// The studio's HTTP API bound to one address.
pub struct Server {
    router: Router,
    addr: SocketAddr,
}

impl Server {
    /// Open the stores named by `config` and build the router.
    pub async fn new(
        config: ServerConfig,
        api: Arc<dyn ImageApi>,
        identity: Arc<dyn IdentityProvider>,
    ) -> std::result::Result<Self, ServerError> {
        let service = StudioService::open(config.storage.clone()).await;
        if !service.is_persistent() {
            info!("Running without a persistent store");
        }

        let state = AppState::new(service, api, identity);
        Self::with_state(config, state)
    }

    /// Serve an already opened `state`.
    pub fn with_state(config: ServerConfig, state: AppState) -> std::result::Result<Self, ServerError> {
        let addr: SocketAddr = format!("{}:{}", config.host, config.port)
            .parse()
            .map_err(|e| ServerError::Runtime(format!("bad listen address {}: {}", config.host, e)))?;

        Ok(Self {
            router: build_router(state),
            addr,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serve until Ctrl-C, letting in-flight requests finish.
    pub async fn run(self) -> std::result::Result<(), ServerError> {
        let listener = bind(self.addr).map_err(|e| ServerError::BindError(self.addr, e))?;
        info!("Studio API listening on {}", self.addr);

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServerError::Runtime(e.to_string()))
    }

    /// The router, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }
}

/// Listening socket with `SO_REUSEADDR`, so a restart can rebind while the
/// previous socket sits in TIME_WAIT.
fn bind(addr: SocketAddr) -> std::io::Result<tokio::net::TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;
    socket.set_nonblocking(true)?;
    tokio::net::TcpListener::from_std(socket.into())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Could not listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
