//! Data models for storage.

use chrono::{DateTime, Local, TimeZone, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use studio_core::imaging::{ImageOperation, DEFAULT_IMAGE_MODEL};

/// Key of the singleton settings record.
pub const SETTINGS_KEY: &str = "main_settings";

/// User id recorded for anonymous visitors.
pub const GUEST_USER_ID: &str = "guest";

/// Display name recorded for anonymous visitors.
pub const GUEST_USER_NAME: &str = "ضيف زائر";

/// Number of image operations a guest may run before signing up.
pub const GUEST_ACTION_LIMIT: u32 = 1;

/// Number of processes shown on the admin overview.
pub const RECENT_PROCESS_COUNT: usize = 5;

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_LENGTH: usize = 9;

/// Random 9-character base36 identifier.
pub fn generate_id() -> String {
    let mut rng = rand::thread_rng();
    (0..ID_LENGTH)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect()
}

/// Current time as epoch milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Image export format preference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Png,
    Jpg,
    Webp,
}

/// Site colours and corner radius.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeConfig {
    pub primary_color: String,
    pub secondary_color: String,
    pub border_radius: String,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            primary_color: "#4f46e5".to_string(),
            secondary_color: "#0d9488".to_string(),
            border_radius: "1.5rem".to_string(),
        }
    }
}

/// A service card shown on the public site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceItem {
    pub title: String,
    pub description: String,
    pub icon: String,
}

impl ServiceItem {
    fn new(title: &str, description: &str, icon: &str) -> Self {
        Self {
            title: title.to_string(),
            description: description.to_string(),
            icon: icon.to_string(),
        }
    }
}

/// The singleton application settings record.
///
/// Deserialization fills missing fields from [`Settings::default`] and
/// ignores unknown ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub active_model: String,
    pub dark_mode: bool,
    pub export_format: ExportFormat,
    /// Argon2 PHC string; absent until the admin completes setup.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_password_hash: Option<String>,
    pub admin_email: String,
    pub is_first_run: bool,
    pub site_name: String,
    pub allow_public_settings: bool,
    pub theme: ThemeConfig,
    pub contact_email: String,
    pub contact_phone: String,
    pub contact_address: String,
    pub services_list: Vec<ServiceItem>,
    pub smtp_host: String,
    pub smtp_user: String,
    pub smtp_from: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            active_model: DEFAULT_IMAGE_MODEL.to_string(),
            dark_mode: false,
            export_format: ExportFormat::Png,
            admin_password_hash: None,
            admin_email: "darhost56@gmail.com".to_string(),
            is_first_run: true,
            site_name: "نانو بانانا الذكي".to_string(),
            allow_public_settings: true,
            theme: ThemeConfig::default(),
            contact_email: "support@nanobanana.com".to_string(),
            contact_phone: "+966 500 000 000".to_string(),
            contact_address: "الرياض، المملكة العربية السعودية".to_string(),
            services_list: vec![
                ServiceItem::new(
                    "تحسين الصور",
                    "تحسين جودة الصور القديمة والمنخفضة الدقة.",
                    "bolt",
                ),
                ServiceItem::new(
                    "إزالة الخلفية",
                    "إزالة الخلفية من أي صورة بضغطة زر.",
                    "scissors",
                ),
                ServiceItem::new(
                    "تلوين الصور",
                    "تحويل الصور الأبيض والأسود إلى صور ملونة زاهية.",
                    "magic",
                ),
            ],
            smtp_host: "smtp.gmail.com".to_string(),
            smtp_user: "darhost56@gmail.com".to_string(),
            smtp_from: "noreply@nanobanana.com".to_string(),
        }
    }
}

/// Name of the plaintext password field written by older releases.
pub(crate) const LEGACY_PASSWORD_FIELD: &str = "adminPassword";

impl Settings {
    /// Merge a stored record over the defaults.
    ///
    /// Fields are applied one at a time so a single malformed field falls
    /// back to its default instead of discarding the whole record. Returns the
    /// merged settings and any legacy plaintext password found.
    pub fn from_stored(stored: &serde_json::Value) -> (Self, Option<String>) {
        let defaults = Self::default();
        let Some(object) = stored.as_object() else {
            tracing::warn!("Stored settings record is not an object, using defaults");
            return (defaults, None);
        };

        let mut merged = match serde_json::to_value(&defaults) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => return (defaults, None),
        };

        for (key, value) in object {
            if key == LEGACY_PASSWORD_FIELD || key == "id" {
                continue;
            }
            let previous = merged.insert(key.clone(), value.clone());
            let candidate = serde_json::Value::Object(merged.clone());
            if serde_json::from_value::<Settings>(candidate).is_err() {
                tracing::warn!(field = %key, "Ignoring malformed settings field");
                match previous {
                    Some(prev) => merged.insert(key.clone(), prev),
                    None => merged.remove(key),
                };
            }
        }

        let settings = serde_json::from_value(serde_json::Value::Object(merged))
            .unwrap_or(defaults);

        let legacy = object
            .get(LEGACY_PASSWORD_FIELD)
            .and_then(|v| v.as_str())
            .filter(|p| !p.is_empty())
            .map(str::to_string);

        (settings, legacy)
    }

    /// Whether an admin password has been configured.
    pub fn has_admin_password(&self) -> bool {
        self.admin_password_hash.is_some()
    }
}

/// Partial settings update. `None` leaves a field unchanged; `theme` and
/// `servicesList` replace the stored value wholesale.
///
/// The password hash and `isFirstRun` are not patchable; both change only
/// through `StudioService::set_admin_password`. Unknown fields such as
/// `isFirstRun` are ignored on deserialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsPatch {
    pub active_model: Option<String>,
    pub dark_mode: Option<bool>,
    pub export_format: Option<ExportFormat>,
    pub admin_email: Option<String>,
    pub site_name: Option<String>,
    pub allow_public_settings: Option<bool>,
    pub theme: Option<ThemeConfig>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub contact_address: Option<String>,
    pub services_list: Option<Vec<ServiceItem>>,
    pub smtp_host: Option<String>,
    pub smtp_user: Option<String>,
    pub smtp_from: Option<String>,
}

macro_rules! apply_fields {
    ($patch:expr, $target:expr, $($field:ident),+ $(,)?) => {
        $(
            if let Some(value) = $patch.$field {
                $target.$field = value;
            }
        )+
    };
}

impl SettingsPatch {
    /// Shallow-merge this patch into `settings`.
    pub fn apply(self, settings: &mut Settings) {
        apply_fields!(
            self,
            settings,
            active_model,
            dark_mode,
            export_format,
            admin_email,
            site_name,
            allow_public_settings,
            theme,
            contact_email,
            contact_phone,
            contact_address,
            services_list,
            smtp_host,
            smtp_user,
            smtp_from,
        );
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A generative model the studio may use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
    pub id: String,
    pub name: String,
    pub description: String,
    pub enabled: bool,
    pub is_pro: bool,
}

/// Partial model update. The id is immutable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub enabled: Option<bool>,
    pub is_pro: Option<bool>,
}

impl ModelPatch {
    pub fn apply(self, model: &mut ModelConfig) {
        apply_fields!(self, model, name, description, enabled, is_pro);
    }
}

/// Models seeded when the store holds none.
pub fn default_models() -> Vec<ModelConfig> {
    vec![
        ModelConfig {
            id: DEFAULT_IMAGE_MODEL.to_string(),
            name: "Gemini 2.5 Flash".to_string(),
            description: "نموذج سريع ومتوازن.".to_string(),
            enabled: true,
            is_pro: false,
        },
        ModelConfig {
            id: "gemini-3-pro-image-preview".to_string(),
            name: "Gemini 3.0 Pro".to_string(),
            description: "أعلى جودة ودقة.".to_string(),
            enabled: true,
            is_pro: true,
        },
    ]
}

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
}

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    /// Epoch milliseconds.
    pub joined_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<UserRole>,
}

impl User {
    /// A new user with a random id, joined now.
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self::with_id(generate_id(), name, email)
    }

    pub fn with_id(id: impl Into<String>, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: email.into(),
            joined_at: now_millis(),
            role: None,
        }
    }
}

/// Kind of image operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessType {
    Generation,
    Editing,
    Enhancement,
    Removal,
}

impl From<ImageOperation> for ProcessType {
    fn from(op: ImageOperation) -> Self {
        match op {
            ImageOperation::Generation => ProcessType::Generation,
            ImageOperation::Editing => ProcessType::Editing,
            ImageOperation::Enhancement => ProcessType::Enhancement,
            ImageOperation::Removal => ProcessType::Removal,
        }
    }
}

/// Outcome of an image operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessStatus {
    Success,
    Error,
}

/// An immutable log entry for one image operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiProcess {
    pub id: String,
    /// `guest` or a user id.
    pub user_id: String,
    pub user_name: String,
    #[serde(rename = "type")]
    pub process_type: ProcessType,
    /// Epoch milliseconds.
    pub timestamp: i64,
    pub status: ProcessStatus,
    pub model: String,
}

/// Parameters for logging a new process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProcess {
    pub user_id: String,
    pub user_name: String,
    #[serde(rename = "type")]
    pub process_type: ProcessType,
    pub timestamp: i64,
    pub status: ProcessStatus,
    pub model: String,
}

impl NewProcess {
    /// A process run now by `user`, or by a guest when `None`.
    pub fn now(
        user: Option<&User>,
        process_type: ProcessType,
        status: ProcessStatus,
        model: impl Into<String>,
    ) -> Self {
        let (user_id, user_name) = match user {
            Some(u) => (u.id.clone(), u.name.clone()),
            None => (GUEST_USER_ID.to_string(), GUEST_USER_NAME.to_string()),
        };
        Self {
            user_id,
            user_name,
            process_type,
            timestamp: now_millis(),
            status,
            model: model.into(),
        }
    }

    pub(crate) fn into_process(self, id: String) -> AiProcess {
        AiProcess {
            id,
            user_id: self.user_id,
            user_name: self.user_name,
            process_type: self.process_type,
            timestamp: self.timestamp,
            status: self.status,
            model: self.model,
        }
    }
}

/// Per-type process counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TypeCounts {
    pub generation: usize,
    pub editing: usize,
    pub enhancement: usize,
    pub removal: usize,
}

/// Admin overview statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessOverview {
    pub total: usize,
    /// Processes whose timestamp falls on the current local day.
    pub today: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub by_type: TypeCounts,
    pub recent: Vec<AiProcess>,
}

impl ProcessOverview {
    /// Summarize processes already sorted newest first.
    pub fn from_processes(processes: &[AiProcess], now: DateTime<Local>) -> Self {
        let today = now.date_naive();
        let mut overview = Self {
            total: processes.len(),
            recent: processes.iter().take(RECENT_PROCESS_COUNT).cloned().collect(),
            ..Default::default()
        };

        for process in processes {
            let on_today = Local
                .timestamp_millis_opt(process.timestamp)
                .single()
                .is_some_and(|t| t.date_naive() == today);
            if on_today {
                overview.today += 1;
            }

            match process.status {
                ProcessStatus::Success => overview.succeeded += 1,
                ProcessStatus::Error => overview.failed += 1,
            }

            match process.process_type {
                ProcessType::Generation => overview.by_type.generation += 1,
                ProcessType::Editing => overview.by_type.editing += 1,
                ProcessType::Enhancement => overview.by_type.enhancement += 1,
                ProcessType::Removal => overview.by_type.removal += 1,
            }
        }

        overview
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_generate_id_shape() {
        let id = generate_id();
        assert_eq!(id.len(), 9);
        assert!(id.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
        assert_ne!(generate_id(), generate_id());
    }

    #[test]
    fn test_settings_serialize_camel_case() {
        let value = serde_json::to_value(Settings::default()).unwrap();
        assert_eq!(value["activeModel"], DEFAULT_IMAGE_MODEL);
        assert_eq!(value["exportFormat"], "png");
        assert_eq!(value["theme"]["primaryColor"], "#4f46e5");
        assert!(value.get("adminPasswordHash").is_none());
    }

    #[test]
    fn test_from_stored_merges_over_defaults() {
        let stored = json!({
            "id": "main_settings",
            "siteName": "X",
            "someFutureField": 42,
        });
        let (settings, legacy) = Settings::from_stored(&stored);

        assert_eq!(settings.site_name, "X");
        assert!(!settings.dark_mode);
        assert_eq!(settings.theme, ThemeConfig::default());
        assert_eq!(settings.services_list.len(), 3);
        assert!(legacy.is_none());
    }

    #[test]
    fn test_from_stored_skips_malformed_field() {
        let stored = json!({"darkMode": "yes", "siteName": "Y"});
        let (settings, _) = Settings::from_stored(&stored);

        assert!(!settings.dark_mode);
        assert_eq!(settings.site_name, "Y");
    }

    #[test]
    fn test_from_stored_extracts_legacy_password() {
        let stored = json!({"adminPassword": "1234", "isFirstRun": false});
        let (settings, legacy) = Settings::from_stored(&stored);

        assert_eq!(legacy.as_deref(), Some("1234"));
        assert!(!settings.is_first_run);
        assert!(settings.admin_password_hash.is_none());
    }

    #[test]
    fn test_patch_is_shallow() {
        let mut settings = Settings::default();
        let patch = SettingsPatch {
            dark_mode: Some(true),
            theme: Some(ThemeConfig {
                primary_color: "#000000".into(),
                secondary_color: "#ffffff".into(),
                border_radius: "0".into(),
            }),
            ..Default::default()
        };
        patch.apply(&mut settings);

        assert!(settings.dark_mode);
        assert_eq!(settings.theme.border_radius, "0");
        assert_eq!(settings.site_name, Settings::default().site_name);
    }

    #[test]
    fn test_patch_deserializes_partial_json() {
        let patch: SettingsPatch = serde_json::from_value(json!({"siteName": "Z"})).unwrap();
        assert_eq!(patch.site_name.as_deref(), Some("Z"));
        assert!(patch.dark_mode.is_none());
        assert!(!patch.is_empty());
        assert!(SettingsPatch::default().is_empty());
    }

    #[test]
    fn test_patch_cannot_touch_first_run() {
        let patch: SettingsPatch =
            serde_json::from_value(json!({"isFirstRun": true, "adminPasswordHash": "x"})).unwrap();
        assert!(patch.is_empty());

        let mut settings = Settings {
            is_first_run: false,
            ..Default::default()
        };
        patch.apply(&mut settings);
        assert!(!settings.is_first_run);
        assert!(settings.admin_password_hash.is_none());
    }

    #[test]
    fn test_model_patch() {
        let mut model = default_models().remove(0);
        ModelPatch {
            enabled: Some(false),
            ..Default::default()
        }
        .apply(&mut model);

        assert!(!model.enabled);
        assert_eq!(model.name, "Gemini 2.5 Flash");
    }

    #[test]
    fn test_process_type_wire_name() {
        let process = NewProcess::now(None, ProcessType::Removal, ProcessStatus::Error, "m")
            .into_process("abc".into());
        let value = serde_json::to_value(&process).unwrap();

        assert_eq!(value["type"], "removal");
        assert_eq!(value["status"], "error");
        assert_eq!(value["userId"], GUEST_USER_ID);
        assert_eq!(value["userName"], GUEST_USER_NAME);
    }

    #[test]
    fn test_overview_counts() {
        let now = Local::now();
        let yesterday = now.timestamp_millis() - 36 * 60 * 60 * 1000;
        let mut processes: Vec<AiProcess> = (0..7)
            .map(|i| {
                let mut p = NewProcess::now(
                    None,
                    if i % 2 == 0 {
                        ProcessType::Editing
                    } else {
                        ProcessType::Generation
                    },
                    if i == 0 {
                        ProcessStatus::Error
                    } else {
                        ProcessStatus::Success
                    },
                    "m",
                )
                .into_process(format!("p{i}"));
                p.timestamp = now.timestamp_millis() - i;
                p
            })
            .collect();
        processes[6].timestamp = yesterday;

        let overview = ProcessOverview::from_processes(&processes, now);
        assert_eq!(overview.total, 7);
        assert_eq!(overview.today, 6);
        assert_eq!(overview.failed, 1);
        assert_eq!(overview.succeeded, 6);
        assert_eq!(overview.by_type.editing, 4);
        assert_eq!(overview.by_type.generation, 3);
        assert_eq!(overview.recent.len(), RECENT_PROCESS_COUNT);
        assert_eq!(overview.recent[0].id, "p0");
    }
}
