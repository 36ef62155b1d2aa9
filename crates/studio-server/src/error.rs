//! API error types.
//!
//! Every error renders as `{"error": <localized message>, "code": <code>}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use studio_core::identity::{IdentityError, IdentityErrorCode};
use studio_core::imaging::{ImageOperation, ImagingError};
use studio_core::AuthError;
use studio_storage::StorageError;

const GENERIC_FAILURE: &str = "حدث خطأ في النظام، يرجى المحاولة مرة أخرى.";

/// API errors.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Admin session missing or expired.
    #[error("session expired")]
    SessionExpired,

    /// Wrong admin password.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Admin password already configured.
    #[error("admin already set up")]
    AlreadySetup,

    /// Guest used up the free actions.
    #[error("guest action limit reached")]
    GuestLimitReached,

    /// Action disabled by the site settings.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Bad request.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Image operation failed.
    #[error("{operation:?} failed: {source}")]
    Imaging {
        operation: ImageOperation,
        source: ImagingError,
    },

    /// Identity provider rejected the request.
    #[error("identity error: {0}")]
    Identity(#[from] IdentityError),

    /// Admin password validation or hashing failed.
    #[error("auth error: {0}")]
    Auth(#[from] AuthError),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(StorageError),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Auth(e) => ApiError::Auth(e),
            other => ApiError::Storage(other),
        }
    }
}

impl ApiError {
    pub fn imaging(operation: ImageOperation, source: ImagingError) -> Self {
        ApiError::Imaging { operation, source }
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::SessionExpired => (StatusCode::UNAUTHORIZED, "session_expired"),
            ApiError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "invalid_credentials"),
            ApiError::AlreadySetup => (StatusCode::CONFLICT, "already_setup"),
            ApiError::GuestLimitReached => (StatusCode::FORBIDDEN, "guest_limit_reached"),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::Imaging { source, .. } => match source {
                ImagingError::MissingApiKey => (StatusCode::SERVICE_UNAVAILABLE, "missing_api_key"),
                ImagingError::InvalidImage(_) => (StatusCode::BAD_REQUEST, "invalid_image"),
                ImagingError::NoImage => (StatusCode::UNPROCESSABLE_ENTITY, "no_image"),
                ImagingError::Api { .. } | ImagingError::Transport(_) => {
                    (StatusCode::BAD_GATEWAY, "upstream_error")
                }
            },
            ApiError::Identity(e) => {
                let status = match e.code {
                    IdentityErrorCode::EmailAlreadyInUse => StatusCode::CONFLICT,
                    IdentityErrorCode::InvalidEmail | IdentityErrorCode::WeakPassword => {
                        StatusCode::BAD_REQUEST
                    }
                    IdentityErrorCode::UserNotFound | IdentityErrorCode::WrongPassword => {
                        StatusCode::UNAUTHORIZED
                    }
                    IdentityErrorCode::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
                    IdentityErrorCode::NetworkRequestFailed => StatusCode::SERVICE_UNAVAILABLE,
                    IdentityErrorCode::Internal => StatusCode::BAD_GATEWAY,
                };
                (status, e.code.as_str())
            }
            ApiError::Auth(AuthError::NotSetup) => (StatusCode::CONFLICT, "setup_required"),
            ApiError::Auth(AuthError::HashingFailed(_) | AuthError::VerificationFailed(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "auth_error")
            }
            ApiError::Auth(_) => (StatusCode::BAD_REQUEST, "invalid_password"),
            ApiError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }

    /// Localized message for the response body.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::SessionExpired => "انتهت الجلسة، يرجى تسجيل الدخول مجدداً.".to_string(),
            ApiError::InvalidCredentials => "كلمة المرور غير صحيحة".to_string(),
            ApiError::AlreadySetup => "تم إعداد كلمة مرور المسؤول مسبقاً.".to_string(),
            ApiError::GuestLimitReached => {
                "انتهت تجربتك المجانية. سجل دخولك للحصول على توليد غير محدود.".to_string()
            }
            ApiError::Forbidden(msg) | ApiError::NotFound(msg) | ApiError::BadRequest(msg) => {
                msg.clone()
            }
            ApiError::Imaging { operation, source } => source.user_message(*operation).to_string(),
            ApiError::Identity(e) => e.translate().to_string(),
            ApiError::Auth(e) => e.user_message().to_string(),
            ApiError::Storage(_) | ApiError::Internal(_) => GENERIC_FAILURE.to_string(),
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        if status.is_server_error() {
            error!(code, "Request failed: {}", self);
        }

        let body = ErrorResponse {
            error: self.user_message(),
            code: code.to_string(),
        };

        (status, axum::Json(body)).into_response()
    }
}

/// Result type for API operations.
pub type Result<T> = std::result::Result<T, ApiError>;
