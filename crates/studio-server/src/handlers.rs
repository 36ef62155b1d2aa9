//! API route handlers for the public site and the admin console.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use tracing::{debug, info, warn};

use studio_core::AuthError;
use studio_storage::{ModelConfig, ModelPatch, SettingsPatch, StudioService, GUEST_ACTION_LIMIT};

use crate::error::{ApiError, Result};
use crate::models::{
    AdminLoginRequest, AdminSettingsResponse, AdminStatusResponse, MeResponse, MessageResponse,
    NewPasswordRequest, OverviewResponse, PreferencesRequest, SessionResponse, SiteResponse,
    TestKeyRequest, TestKeyResponse, UsersResponse,
};
use crate::session::{bearer_token, AdminSession, Client};
use crate::state::AppState;

/// Ensure `id` names an enabled model.
pub(crate) fn ensure_enabled_model(service: &StudioService, id: &str) -> Result<()> {
    let enabled = service
        .get_models()
        .iter()
        .any(|m| m.id == id && m.enabled);
    if enabled {
        Ok(())
    } else {
        Err(ApiError::BadRequest("النموذج المحدد غير متاح.".to_string()))
    }
}

// ===== Public =====

/// GET /api/site - Public settings and enabled models.
pub async fn get_site(State(state): State<AppState>) -> Json<SiteResponse> {
    Json(SiteResponse::new(
        state.service.get_settings(),
        state.service.get_models(),
    ))
}

/// PUT /api/preferences - Visitor preferences, when the admin allows them.
pub async fn update_preferences(
    State(state): State<AppState>,
    Json(req): Json<PreferencesRequest>,
) -> Result<Json<SiteResponse>> {
    if !state.service.get_settings().allow_public_settings {
        return Err(ApiError::Forbidden(
            "تم تعطيل الإعدادات العامة من قبل المسؤول.".to_string(),
        ));
    }

    if let Some(ref model) = req.active_model {
        ensure_enabled_model(&state.service, model)?;
    }

    debug!(?req, "Updating public preferences");
    state.service.update_settings(req.into()).await?;

    Ok(Json(SiteResponse::new(
        state.service.get_settings(),
        state.service.get_models(),
    )))
}

/// GET /api/me - Current user and guest allowance.
pub async fn get_me(State(state): State<AppState>, Client(client): Client) -> Json<MeResponse> {
    let user = state.service.get_current_user(&client);
    let guest_action_count = state.service.get_guest_action_count(&client);
    let can_perform_action = user.is_some() || guest_action_count < GUEST_ACTION_LIMIT;

    Json(MeResponse {
        user,
        guest_action_count,
        guest_action_limit: GUEST_ACTION_LIMIT,
        can_perform_action,
    })
}

// ===== Admin authentication =====

/// GET /api/admin/status - Whether setup is needed and the caller's session
/// is active.
pub async fn admin_status(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Json<AdminStatusResponse> {
    let session_expires_at = bearer_token(&headers)
        .filter(|token| state.service.is_session_valid(token))
        .and_then(|token| state.service.session().session_expiry(&token));

    Json(AdminStatusResponse {
        first_run: state.service.needs_setup(),
        authenticated: session_expires_at.is_some(),
        session_expires_at,
    })
}

/// POST /api/admin/setup - Set the first admin password and sign in.
pub async fn admin_setup(
    State(state): State<AppState>,
    Json(req): Json<NewPasswordRequest>,
) -> Result<Json<SessionResponse>> {
    if !state.service.needs_setup() {
        return Err(ApiError::AlreadySetup);
    }

    state
        .service
        .set_admin_password(&req.password, &req.confirm_password)?
        .await?;

    let session = state.service.start_session();
    info!("Admin password configured");

    Ok(Json(session.into()))
}

/// POST /api/admin/login - Verify the admin password and start a session.
pub async fn admin_login(
    State(state): State<AppState>,
    Json(req): Json<AdminLoginRequest>,
) -> Result<Json<SessionResponse>> {
    if state.service.needs_setup() {
        return Err(AuthError::NotSetup.into());
    }
    if req.password.is_empty() {
        return Err(AuthError::PasswordEmpty.into());
    }

    let service = state.service.clone();
    let valid = tokio::task::spawn_blocking(move || service.verify_password(&req.password))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    if !valid {
        warn!("Rejected admin login attempt");
        return Err(ApiError::InvalidCredentials);
    }

    let session = state.service.start_session();
    info!("Admin session started");

    Ok(Json(session.into()))
}

/// POST /api/admin/logout - End the caller's admin session.
pub async fn admin_logout(
    State(state): State<AppState>,
    AdminSession(token): AdminSession,
) -> Json<MessageResponse> {
    state.service.end_session(&token);
    Json(MessageResponse::ok("تم تسجيل الخروج."))
}

/// POST /api/admin/password - Change the admin password.
pub async fn change_password(
    State(state): State<AppState>,
    _admin: AdminSession,
    Json(req): Json<NewPasswordRequest>,
) -> Result<Json<MessageResponse>> {
    state
        .service
        .set_admin_password(&req.password, &req.confirm_password)?
        .await?;

    Ok(Json(MessageResponse::ok("تم تحديث كلمة المرور.")))
}

/// POST /api/admin/test-key - Check an image API key.
pub async fn test_api_key(
    State(state): State<AppState>,
    _admin: AdminSession,
    Json(req): Json<TestKeyRequest>,
) -> Result<Json<TestKeyResponse>> {
    let valid = state.images.api().test_api_key(&req.api_key).await;
    info!(valid, "Tested image API key");

    Ok(Json(TestKeyResponse { valid }))
}

// ===== Admin data =====

/// GET /api/admin/settings - Full settings, without the password hash.
pub async fn get_settings(
    State(state): State<AppState>,
    _admin: AdminSession,
) -> Json<AdminSettingsResponse> {
    Json(state.service.get_settings().into())
}

/// PUT /api/admin/settings - Merge a settings patch.
pub async fn update_settings(
    State(state): State<AppState>,
    _admin: AdminSession,
    Json(patch): Json<SettingsPatch>,
) -> Result<Json<AdminSettingsResponse>> {
    if let Some(ref model) = patch.active_model {
        if !state.service.get_models().iter().any(|m| &m.id == model) {
            return Err(ApiError::BadRequest("النموذج المحدد غير موجود.".to_string()));
        }
    }

    state.service.update_settings(patch).await?;
    info!("Settings updated");

    Ok(Json(state.service.get_settings().into()))
}

/// GET /api/admin/models - All models.
pub async fn get_models(
    State(state): State<AppState>,
    _admin: AdminSession,
) -> Json<Vec<ModelConfig>> {
    Json(state.service.get_models())
}

/// PUT /api/admin/models/{id} - Patch one model.
pub async fn update_model(
    State(state): State<AppState>,
    _admin: AdminSession,
    Path(id): Path<String>,
    Json(patch): Json<ModelPatch>,
) -> Result<Json<Vec<ModelConfig>>> {
    if !state.service.get_models().iter().any(|m| m.id == id) {
        return Err(ApiError::NotFound(format!("النموذج {} غير موجود.", id)));
    }

    state.service.update_model(&id, patch).await?;
    info!(model = %id, "Model updated");

    Ok(Json(state.service.get_models()))
}

/// GET /api/admin/users - All registered users.
pub async fn get_users(State(state): State<AppState>, _admin: AdminSession) -> Json<UsersResponse> {
    let users = state.service.get_all_users().await;
    let total = users.len();
    Json(UsersResponse { users, total })
}

/// DELETE /api/admin/users/{id} - Remove a user record.
pub async fn delete_user(
    State(state): State<AppState>,
    _admin: AdminSession,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>> {
    if !state.service.delete_user(&id).await {
        return Err(ApiError::NotFound("المستخدم غير موجود.".to_string()));
    }

    info!(user = %id, "User deleted");
    Ok(Json(MessageResponse::ok("تم حذف المستخدم.")))
}

/// GET /api/admin/processes - Process log, newest first.
pub async fn get_processes(
    State(state): State<AppState>,
    _admin: AdminSession,
) -> Json<Vec<studio_storage::AiProcess>> {
    Json(state.service.get_all_processes().await)
}

/// GET /api/admin/overview - Dashboard statistics.
pub async fn get_overview(
    State(state): State<AppState>,
    _admin: AdminSession,
) -> Json<OverviewResponse> {
    let users = state.service.get_all_users().await.len();
    let processes = state.service.process_overview().await;

    Json(OverviewResponse { users, processes })
}
