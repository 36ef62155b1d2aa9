//! Visitor account flow with local fallback.
//!
//! Accounts live with the hosted identity provider. When the provider is
//! unreachable (or disabled), the visitor still gets a local-only account so
//! the studio stays usable.

use axum::extract::State;
use axum::Json;
use tracing::{info, warn};

use studio_core::identity::{email_local_part, is_valid_email, RemoteUser};
use studio_core::{IdentityError, IdentityErrorCode};
use studio_storage::User;

use crate::error::{ApiError, Result};
use crate::models::{
    AccountResponse, ForgotPasswordRequest, LoginRequest, MessageResponse, RegisterRequest,
};
use crate::session::Client;
use crate::state::AppState;

const FALLBACK_NAME: &str = "مستخدم";

fn check_email(email: &str) -> Result<()> {
    if is_valid_email(email) {
        Ok(())
    } else {
        Err(IdentityError::new(IdentityErrorCode::InvalidEmail, email).into())
    }
}

fn require_fields(fields: &[&str]) -> Result<()> {
    if fields.iter().any(|f| f.trim().is_empty()) {
        return Err(ApiError::BadRequest("يرجى ملء جميع الحقول.".to_string()));
    }
    Ok(())
}

fn mirrored(remote: &RemoteUser, name: String) -> User {
    User::with_id(remote.uid.clone(), name, remote.email.clone())
}

/// POST /api/account/register
pub async fn register(
    State(state): State<AppState>,
    Client(client): Client,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<AccountResponse>> {
    let email = req.email.trim();
    require_fields(&[email, req.password.as_str()])?;
    check_email(email)?;

    let name = match req.name.trim() {
        "" => email_local_part(email).unwrap_or(FALLBACK_NAME).to_string(),
        name => name.to_string(),
    };

    match state.identity.sign_up(email, &req.password).await {
        Ok(remote) => {
            if let Err(e) = state.identity.update_profile(&remote, &name).await {
                warn!("Failed to set display name: {}", e);
            }
            if let Err(e) = state.identity.send_email_verification(&remote).await {
                warn!("Failed to send verification email: {}", e);
            }

            let user = state.service.mirror_remote_user(&client, mirrored(&remote, name)).await;
            info!(user = %user.id, "Registered account");

            Ok(Json(AccountResponse {
                user,
                local: false,
                message: "تم إنشاء الحساب! يرجى تفعيل حسابك.".to_string(),
            }))
        }
        Err(e) if e.is_fallback_trigger(true) => {
            warn!("Identity provider unavailable, registering locally: {}", e);
            let user = state.service.register_user_locally(&client, &name, email).await;

            Ok(Json(AccountResponse {
                user,
                local: true,
                message: "تم إنشاء الحساب عبر النظام المحلي.".to_string(),
            }))
        }
        Err(e) => Err(e.into()),
    }
}

/// POST /api/account/login
pub async fn login(
    State(state): State<AppState>,
    Client(client): Client,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AccountResponse>> {
    let email = req.email.trim();
    require_fields(&[email, req.password.as_str()])?;

    match state.identity.sign_in(email, &req.password).await {
        Ok(remote) => {
            let name = remote.name_or_fallback();
            let user = state.service.mirror_remote_user(&client, mirrored(&remote, name)).await;
            info!(user = %user.id, "Signed in");

            Ok(Json(AccountResponse {
                user,
                local: false,
                message: "تم تسجيل الدخول بنجاح.".to_string(),
            }))
        }
        Err(e) if e.is_fallback_trigger(false) => {
            warn!("Identity provider unavailable, signing in locally: {}", e);
            let name = email_local_part(email).unwrap_or(FALLBACK_NAME);
            let user = state.service.register_user_locally(&client, name, email).await;

            Ok(Json(AccountResponse {
                user,
                local: true,
                message: "تم الدخول عبر النظام المحلي.".to_string(),
            }))
        }
        Err(e) => Err(e.into()),
    }
}

/// POST /api/account/forgot
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>> {
    let email = req.email.trim();
    require_fields(&[email])?;
    check_email(email)?;

    state.identity.send_password_reset(email).await?;
    Ok(Json(MessageResponse::ok("تم إرسال رابط الاستعادة.")))
}

/// POST /api/account/logout
pub async fn logout(
    State(state): State<AppState>,
    Client(client): Client,
) -> Json<MessageResponse> {
    state.service.logout_user(&client);
    Json(MessageResponse::ok("تم تسجيل الخروج."))
}
