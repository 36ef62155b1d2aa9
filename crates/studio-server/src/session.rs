//! Per-request identities.
//!
//! Every visitor carries a client token in the `x-studio-client` header. A
//! request without a well-formed one is issued a fresh token, and the token
//! in use is echoed on every response. The current user and the guest
//! counter are keyed by it.
//!
//! Admin routes take a separate session token as `Authorization: Bearer`.

use axum::extract::{FromRequestParts, Request};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use tracing::debug;

use studio_core::SessionToken;

use crate::error::{ApiError, Result};
use crate::state::AppState;

/// Header carrying the visitor's client token.
pub const CLIENT_HEADER: &str = "x-studio-client";

/// The visitor making the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Client(pub SessionToken);

/// Attach a [`Client`] to the request and echo its token on the response.
pub async fn assign_client(mut req: Request, next: Next) -> Response {
    let presented = req
        .headers()
        .get(CLIENT_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(SessionToken::parse);
    let token = presented.unwrap_or_else(|| {
        debug!("Issuing client token");
        SessionToken::new()
    });

    req.extensions_mut().insert(Client(token.clone()));
    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(token.as_str()) {
        response.headers_mut().insert(CLIENT_HEADER, value);
    }
    response
}

impl<S: Send + Sync> FromRequestParts<S> for Client {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        parts
            .extensions
            .get::<Client>()
            .cloned()
            .ok_or_else(|| ApiError::Internal("client token layer not installed".to_string()))
    }
}

/// Session token from `Authorization: Bearer <token>`, if well-formed.
pub fn bearer_token(headers: &HeaderMap) -> Option<SessionToken> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .and_then(SessionToken::parse)
}

/// A live admin session; rejects the request with 401 otherwise.
#[derive(Debug, Clone)]
pub struct AdminSession(pub SessionToken);

impl FromRequestParts<AppState> for AdminSession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        match bearer_token(&parts.headers) {
            Some(token) if state.service.is_session_valid(&token) => Ok(Self(token)),
            _ => Err(ApiError::SessionExpired),
        }
    }
}
