//! API request and response models.

use serde::{Deserialize, Serialize};

use studio_core::imaging::{EnhanceMode, GeneratedImage, GenerationRequest};
use studio_storage::{
    ExportFormat, ModelConfig, ProcessOverview, ServiceItem, Settings, SettingsPatch, ThemeConfig,
    User,
};

// ===== Public site =====

/// Response body for GET /api/site.
///
/// Never carries the password hash or mail server details.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteResponse {
    pub site_name: String,
    pub active_model: String,
    pub dark_mode: bool,
    pub export_format: ExportFormat,
    pub allow_public_settings: bool,
    pub theme: ThemeConfig,
    pub contact_email: String,
    pub contact_phone: String,
    pub contact_address: String,
    pub services_list: Vec<ServiceItem>,
    /// Enabled models only.
    pub models: Vec<ModelConfig>,
}

impl SiteResponse {
    pub fn new(settings: Settings, models: Vec<ModelConfig>) -> Self {
        Self {
            site_name: settings.site_name,
            active_model: settings.active_model,
            dark_mode: settings.dark_mode,
            export_format: settings.export_format,
            allow_public_settings: settings.allow_public_settings,
            theme: settings.theme,
            contact_email: settings.contact_email,
            contact_phone: settings.contact_phone,
            contact_address: settings.contact_address,
            services_list: settings.services_list,
            models: models.into_iter().filter(|m| m.enabled).collect(),
        }
    }
}

/// Request body for PUT /api/preferences.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PreferencesRequest {
    pub active_model: Option<String>,
    pub export_format: Option<ExportFormat>,
    pub dark_mode: Option<bool>,
    pub theme: Option<ThemeConfig>,
}

impl From<PreferencesRequest> for SettingsPatch {
    fn from(req: PreferencesRequest) -> Self {
        SettingsPatch {
            active_model: req.active_model,
            export_format: req.export_format,
            dark_mode: req.dark_mode,
            theme: req.theme,
            ..Default::default()
        }
    }
}

/// Response body for GET /api/me.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub user: Option<User>,
    pub guest_action_count: u32,
    pub guest_action_limit: u32,
    /// Whether the next image operation will be accepted.
    pub can_perform_action: bool,
}

// ===== Accounts =====

/// Request body for POST /api/account/register.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Request body for POST /api/account/login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request body for POST /api/account/forgot.
#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// Response body for register and login.
#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub user: User,
    /// True when the account lives only in local storage.
    pub local: bool,
    pub message: String,
}

/// Generic acknowledgement.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

// ===== Studio =====

fn default_intensity() -> u8 {
    50
}

/// Request body for POST /api/studio/edit.
#[derive(Debug, Deserialize)]
pub struct EditRequest {
    /// `data:<mime>;base64,<payload>`
    pub image: String,
    pub prompt: String,
    #[serde(default = "default_intensity")]
    pub intensity: u8,
    pub model: Option<String>,
}

/// Request body for POST /api/studio/enhance.
#[derive(Debug, Deserialize)]
pub struct EnhanceRequest {
    pub image: String,
    #[serde(default)]
    pub mode: EnhanceMode,
    pub model: Option<String>,
}

/// Request body for POST /api/studio/remove-background.
#[derive(Debug, Deserialize)]
pub struct RemoveBackgroundRequest {
    pub image: String,
    pub model: Option<String>,
}

/// Request body for POST /api/studio/generate.
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(flatten)]
    pub generation: GenerationRequest,
    pub model: Option<String>,
}

/// Response body for the studio operations.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageResponse {
    /// `data:` URL of the result.
    pub image_url: String,
    pub mime_type: String,
    pub model: String,
    /// Free actions left for a guest; absent for signed-in users.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guest_actions_remaining: Option<u32>,
}

impl ImageResponse {
    pub fn new(image: GeneratedImage, model: String, guest_actions_remaining: Option<u32>) -> Self {
        Self {
            image_url: image.data_url(),
            mime_type: image.mime_type,
            model,
            guest_actions_remaining,
        }
    }
}

// ===== Admin =====

/// Response body for GET /api/admin/status.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStatusResponse {
    pub first_run: bool,
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_expires_at: Option<i64>,
}

/// Request body for POST /api/admin/setup and /api/admin/password.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPasswordRequest {
    pub password: String,
    pub confirm_password: String,
}

/// Request body for POST /api/admin/login.
#[derive(Debug, Deserialize)]
pub struct AdminLoginRequest {
    #[serde(default)]
    pub password: String,
}

/// Response body for a started admin session.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub success: bool,
    /// Sent back as `Authorization: Bearer <token>` on admin routes.
    pub token: String,
    /// Epoch milliseconds.
    pub expires_at: i64,
}

impl From<studio_storage::AdminSession> for SessionResponse {
    fn from(session: studio_storage::AdminSession) -> Self {
        Self {
            success: true,
            token: session.token.to_string(),
            expires_at: session.expires_at,
        }
    }
}

/// Request body for POST /api/admin/test-key.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestKeyRequest {
    pub api_key: String,
}

/// Response body for POST /api/admin/test-key.
#[derive(Debug, Serialize)]
pub struct TestKeyResponse {
    pub valid: bool,
}

/// Admin view of the settings: everything except the password hash.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminSettingsResponse {
    #[serde(flatten)]
    pub settings: Settings,
    pub has_admin_password: bool,
}

impl From<Settings> for AdminSettingsResponse {
    fn from(mut settings: Settings) -> Self {
        let has_admin_password = settings.admin_password_hash.take().is_some();
        Self {
            settings,
            has_admin_password,
        }
    }
}

/// Response body for GET /api/admin/users.
#[derive(Debug, Serialize)]
pub struct UsersResponse {
    pub users: Vec<User>,
    pub total: usize,
}

/// Response body for GET /api/admin/overview.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewResponse {
    pub users: usize,
    pub processes: ProcessOverview,
}
