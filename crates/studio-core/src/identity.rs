//! Remote identity provider.
//!
//! Accounts are created and signed in against a hosted identity service
//! (Firebase Auth REST API). When the service is unreachable or not
//! configured, callers fall back to local-only accounts; see
//! [`IdentityError::is_fallback_trigger`].

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Default identity service base URL.
pub const DEFAULT_IDENTITY_ENDPOINT: &str = "https://identitytoolkit.googleapis.com/v1";

/// Provider error codes, named after the service's `auth/*` codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IdentityErrorCode {
    #[serde(rename = "auth/email-already-in-use")]
    EmailAlreadyInUse,
    #[serde(rename = "auth/invalid-email")]
    InvalidEmail,
    #[serde(rename = "auth/weak-password")]
    WeakPassword,
    #[serde(rename = "auth/user-not-found")]
    UserNotFound,
    #[serde(rename = "auth/wrong-password")]
    WrongPassword,
    #[serde(rename = "auth/too-many-requests")]
    TooManyRequests,
    #[serde(rename = "auth/network-request-failed")]
    NetworkRequestFailed,
    #[serde(rename = "auth/internal-error")]
    Internal,
}

impl IdentityErrorCode {
    /// The `auth/*` code string.
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityErrorCode::EmailAlreadyInUse => "auth/email-already-in-use",
            IdentityErrorCode::InvalidEmail => "auth/invalid-email",
            IdentityErrorCode::WeakPassword => "auth/weak-password",
            IdentityErrorCode::UserNotFound => "auth/user-not-found",
            IdentityErrorCode::WrongPassword => "auth/wrong-password",
            IdentityErrorCode::TooManyRequests => "auth/too-many-requests",
            IdentityErrorCode::NetworkRequestFailed => "auth/network-request-failed",
            IdentityErrorCode::Internal => "auth/internal-error",
        }
    }

    /// Localized message for this code.
    pub fn translate(&self) -> &'static str {
        match self {
            IdentityErrorCode::EmailAlreadyInUse => "هذا البريد الإلكتروني مسجل بالفعل.",
            IdentityErrorCode::InvalidEmail => "البريد الإلكتروني غير صحيح.",
            IdentityErrorCode::WeakPassword => "كلمة المرور ضعيفة جداً.",
            IdentityErrorCode::UserNotFound => "لا يوجد حساب بهذا البريد.",
            IdentityErrorCode::WrongPassword => "كلمة المرور غير صحيحة.",
            IdentityErrorCode::TooManyRequests => "محاولات كثيرة خاطئة، يرجى المحاولة لاحقاً.",
            IdentityErrorCode::NetworkRequestFailed => {
                "نواجه مشكلة في الاتصال بالخادم، سيتم استخدام النظام المحلي مؤقتاً."
            }
            IdentityErrorCode::Internal => "حدث خطأ في النظام، يرجى المحاولة مرة أخرى.",
        }
    }

    /// Map a REST error message (e.g. `EMAIL_EXISTS`) to a code.
    pub fn from_service_message(message: &str) -> Self {
        // Messages may carry a suffix: "WEAK_PASSWORD : Password should be ..."
        let head = message.split([' ', ':']).next().unwrap_or_default();
        match head {
            "EMAIL_EXISTS" => IdentityErrorCode::EmailAlreadyInUse,
            "INVALID_EMAIL" | "MISSING_EMAIL" => IdentityErrorCode::InvalidEmail,
            "WEAK_PASSWORD" | "MISSING_PASSWORD" => IdentityErrorCode::WeakPassword,
            "EMAIL_NOT_FOUND" | "USER_DISABLED" => IdentityErrorCode::UserNotFound,
            "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => IdentityErrorCode::WrongPassword,
            "TOO_MANY_ATTEMPTS_TRY_LATER" => IdentityErrorCode::TooManyRequests,
            _ => IdentityErrorCode::Internal,
        }
    }
}

/// Error returned by an identity provider.
#[derive(Debug, Clone, Error)]
#[error("{} ({message})", .code.as_str())]
pub struct IdentityError {
    pub code: IdentityErrorCode,
    pub message: String,
}

impl IdentityError {
    pub fn new(code: IdentityErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(IdentityErrorCode::NetworkRequestFailed, message)
    }

    /// Whether the caller should switch to a local-only account.
    ///
    /// Network failures always qualify. Registration also falls back when the
    /// provider rejects its own API key.
    pub fn is_fallback_trigger(&self, registering: bool) -> bool {
        self.code == IdentityErrorCode::NetworkRequestFailed
            || (registering && self.message.contains("API key"))
    }

    pub fn translate(&self) -> &'static str {
        self.code.translate()
    }
}

pub type Result<T> = std::result::Result<T, IdentityError>;

/// A signed-in remote account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteUser {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    #[serde(skip_serializing)]
    pub id_token: String,
}

impl RemoteUser {
    /// Display name, else the email's local part, else a generic label.
    pub fn name_or_fallback(&self) -> String {
        if let Some(name) = self.display_name.as_deref().filter(|n| !n.is_empty()) {
            return name.to_string();
        }
        email_local_part(&self.email)
            .map(str::to_string)
            .unwrap_or_else(|| "مستخدم".to_string())
    }
}

/// The part of an address before `@`, if non-empty.
pub fn email_local_part(email: &str) -> Option<&str> {
    email.split('@').next().filter(|p| !p.is_empty())
}

/// Loose syntactic email check.
pub fn is_valid_email(email: &str) -> bool {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL
        .get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("Invalid regex pattern"))
        .is_match(email)
}

/// A hosted account service.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> Result<RemoteUser>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<RemoteUser>;

    async fn update_profile(&self, user: &RemoteUser, display_name: &str) -> Result<()>;

    async fn send_email_verification(&self, user: &RemoteUser) -> Result<()>;

    async fn send_password_reset(&self, email: &str) -> Result<()>;
}

/// Provider used when no identity service is configured.
///
/// Sign-up and sign-in report a network failure so callers take the local
/// path; the remaining calls succeed without doing anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledIdentity;

#[async_trait]
impl IdentityProvider for DisabledIdentity {
    async fn sign_up(&self, _email: &str, _password: &str) -> Result<RemoteUser> {
        Err(IdentityError::network("identity service not configured"))
    }

    async fn sign_in(&self, _email: &str, _password: &str) -> Result<RemoteUser> {
        Err(IdentityError::network("identity service not configured"))
    }

    async fn update_profile(&self, _user: &RemoteUser, _display_name: &str) -> Result<()> {
        Ok(())
    }

    async fn send_email_verification(&self, _user: &RemoteUser) -> Result<()> {
        Ok(())
    }

    async fn send_password_reset(&self, _email: &str) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    local_id: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    id_token: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
}

/// Firebase Auth over its REST API.
#[derive(Debug, Clone)]
pub struct FirebaseIdentity {
    endpoint: String,
    api_key: String,
    /// Where links in verification and reset emails return to.
    continue_url: Option<String>,
    client: reqwest::Client,
}

impl FirebaseIdentity {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_endpoint(DEFAULT_IDENTITY_ENDPOINT, api_key)
    }

    pub fn with_endpoint(endpoint: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| IdentityError::network(e.to_string()))?;

        Ok(Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            continue_url: None,
            client,
        })
    }

    pub fn with_continue_url(mut self, url: impl Into<String>) -> Self {
        self.continue_url = Some(url.into());
        self
    }

    fn oob_request(&self, mut body: serde_json::Value) -> serde_json::Value {
        if let Some(ref url) = self.continue_url {
            body["continueUrl"] = serde_json::Value::String(url.clone());
        }
        body
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<T> {
        let url = format!(
            "{}/accounts:{}?key={}",
            self.endpoint.trim_end_matches('/'),
            method,
            self.api_key
        );
        debug!(method, "Calling identity service");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| IdentityError::network(e.to_string()))?;

        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|b| b.error.message)
                .unwrap_or(text);
            return Err(IdentityError::new(
                IdentityErrorCode::from_service_message(&message),
                message,
            ));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| IdentityError::new(IdentityErrorCode::Internal, e.to_string()))
    }

    async fn authenticate(&self, method: &str, email: &str, password: &str) -> Result<RemoteUser> {
        let resp: AuthResponse = self
            .call(
                method,
                serde_json::json!({
                    "email": email,
                    "password": password,
                    "returnSecureToken": true,
                }),
            )
            .await?;

        Ok(RemoteUser {
            uid: resp.local_id,
            email: if resp.email.is_empty() {
                email.to_string()
            } else {
                resp.email
            },
            display_name: resp.display_name.filter(|n| !n.is_empty()),
            id_token: resp.id_token,
        })
    }
}

#[async_trait]
impl IdentityProvider for FirebaseIdentity {
    async fn sign_up(&self, email: &str, password: &str) -> Result<RemoteUser> {
        self.authenticate("signUp", email, password).await
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<RemoteUser> {
        self.authenticate("signInWithPassword", email, password).await
    }

    async fn update_profile(&self, user: &RemoteUser, display_name: &str) -> Result<()> {
        let _: serde_json::Value = self
            .call(
                "update",
                serde_json::json!({
                    "idToken": user.id_token,
                    "displayName": display_name,
                    "returnSecureToken": false,
                }),
            )
            .await?;
        Ok(())
    }

    async fn send_email_verification(&self, user: &RemoteUser) -> Result<()> {
        let _: serde_json::Value = self
            .call(
                "sendOobCode",
                self.oob_request(serde_json::json!({
                    "requestType": "VERIFY_EMAIL",
                    "idToken": user.id_token,
                })),
            )
            .await?;
        Ok(())
    }

    async fn send_password_reset(&self, email: &str) -> Result<()> {
        let _: serde_json::Value = self
            .call(
                "sendOobCode",
                self.oob_request(serde_json::json!({
                    "requestType": "PASSWORD_RESET",
                    "email": email,
                })),
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(display_name: Option<&str>, email: &str) -> RemoteUser {
        RemoteUser {
            uid: "uid-1".into(),
            email: email.into(),
            display_name: display_name.map(str::to_string),
            id_token: "token".into(),
        }
    }

    #[test]
    fn test_service_messages_map_to_codes() {
        assert_eq!(
            IdentityErrorCode::from_service_message("EMAIL_EXISTS"),
            IdentityErrorCode::EmailAlreadyInUse
        );
        assert_eq!(
            IdentityErrorCode::from_service_message(
                "WEAK_PASSWORD : Password should be at least 6 characters"
            ),
            IdentityErrorCode::WeakPassword
        );
        assert_eq!(
            IdentityErrorCode::from_service_message("INVALID_LOGIN_CREDENTIALS"),
            IdentityErrorCode::WrongPassword
        );
        assert_eq!(
            IdentityErrorCode::from_service_message("something new"),
            IdentityErrorCode::Internal
        );
    }

    #[test]
    fn test_translation() {
        assert_eq!(
            IdentityErrorCode::UserNotFound.translate(),
            "لا يوجد حساب بهذا البريد."
        );
        assert_eq!(
            IdentityErrorCode::Internal.translate(),
            "حدث خطأ في النظام، يرجى المحاولة مرة أخرى."
        );
    }

    #[test]
    fn test_fallback_triggers() {
        let network = IdentityError::network("offline");
        assert!(network.is_fallback_trigger(false));
        assert!(network.is_fallback_trigger(true));

        let bad_key = IdentityError::new(
            IdentityErrorCode::Internal,
            "API key not valid. Please pass a valid API key.",
        );
        assert!(bad_key.is_fallback_trigger(true));
        assert!(!bad_key.is_fallback_trigger(false));

        let exists = IdentityError::new(IdentityErrorCode::EmailAlreadyInUse, "EMAIL_EXISTS");
        assert!(!exists.is_fallback_trigger(true));
    }

    #[test]
    fn test_name_fallbacks() {
        assert_eq!(remote(Some("Sara"), "s@x.io").name_or_fallback(), "Sara");
        assert_eq!(remote(Some(""), "sara@x.io").name_or_fallback(), "sara");
        assert_eq!(remote(None, "").name_or_fallback(), "مستخدم");
    }

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("a@b.co"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@c.io"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn test_continue_url_added_to_email_requests() {
        let provider = FirebaseIdentity::new("key").unwrap();
        let body = serde_json::json!({"requestType": "PASSWORD_RESET"});
        assert!(provider.oob_request(body.clone()).get("continueUrl").is_none());

        let provider = provider.with_continue_url("https://studio.example.com");
        assert_eq!(
            provider.oob_request(body)["continueUrl"],
            "https://studio.example.com"
        );
    }

    #[tokio::test]
    async fn test_disabled_provider_triggers_fallback() {
        let provider = DisabledIdentity;
        let err = provider.sign_in("a@b.co", "secret").await.unwrap_err();
        assert!(err.is_fallback_trigger(false));
        assert!(provider.send_password_reset("a@b.co").await.is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_service_is_network_failure() {
        let provider = FirebaseIdentity::with_endpoint("http://127.0.0.1:9", "key").unwrap();
        let err = provider.sign_in("a@b.co", "secret").await.unwrap_err();
        assert_eq!(err.code, IdentityErrorCode::NetworkRequestFailed);
    }
}
