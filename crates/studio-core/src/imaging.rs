//! Generative-image API client.
//!
//! Wraps a Gemini-compatible `generateContent` endpoint behind the
//! [`ImageApi`] trait and builds the instructions for the four studio
//! operations: editing, enhancement, background removal and generation.
//!
//! A response that carries no inline image is an application-level failure
//! ([`ImagingError::NoImage`]), not a transport error. Every failure maps to a
//! single localized message through [`ImagingError::user_message`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Default model used by every operation.
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";

/// Model used to check whether an API key works.
pub const KEY_TEST_MODEL: &str = "gemini-3-flash-preview";

/// Default API base URL.
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Mime type assumed when the service does not report one.
const FALLBACK_MIME: &str = "image/png";

const TRANSPARENCY_CLAUSE: &str = "CRITICAL: Preserve the original image transparency (alpha channel). Do NOT add any background color. The output must be transparent where the input is transparent.";

/// Instruction sent for background removal.
pub const REMOVE_BACKGROUND_INSTRUCTION: &str = "Carefully remove the background from this image. Identify the main subjects and isolate them perfectly. CRITICAL: The output MUST be a transparent PNG. All areas that were background must be fully transparent (alpha=0). Preserve the fine edges of the subject.";

/// Errors from the image API.
#[derive(Debug, Error)]
pub enum ImagingError {
    /// No API key configured. Raised before any request is sent.
    #[error("missing API key")]
    MissingApiKey,

    /// The uploaded image payload is not valid base64.
    #[error("invalid image payload: {0}")]
    InvalidImage(String),

    /// The service answered but returned no image.
    #[error("no image in response")]
    NoImage,

    /// The service rejected the request.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Network or decoding failure.
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for ImagingError {
    fn from(e: reqwest::Error) -> Self {
        ImagingError::Transport(e.to_string())
    }
}

impl ImagingError {
    /// The single localized message shown for a failed operation.
    pub fn user_message(&self, operation: ImageOperation) -> &'static str {
        match self {
            ImagingError::MissingApiKey => "مفتاح API مفقود.",
            ImagingError::NoImage => operation.no_image_message(),
            _ => operation.failure_message(),
        }
    }
}

/// Result type for image API operations.
pub type Result<T> = std::result::Result<T, ImagingError>;

/// The four studio operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageOperation {
    Editing,
    Enhancement,
    Removal,
    Generation,
}

impl ImageOperation {
    fn no_image_message(&self) -> &'static str {
        match self {
            ImageOperation::Editing => "لم يتم توليد صورة.",
            ImageOperation::Enhancement => "لم ينجح التحسين، حاول مرة أخرى.",
            ImageOperation::Removal => {
                "لم يتمكن الذكاء الاصطناعي من معالجة الخلفية، جرب صورة أخرى."
            }
            ImageOperation::Generation => "فشل الذكاء الاصطناعي في ابتكار صورة لهذا الوصف.",
        }
    }

    fn failure_message(&self) -> &'static str {
        match self {
            ImageOperation::Editing => "فشل تعديل الصورة.",
            ImageOperation::Enhancement => "فشل تحسين الصورة.",
            ImageOperation::Removal => "فشل إزالة الخلفية.",
            ImageOperation::Generation => "فشل توليد الصورة.",
        }
    }
}

// ===== Wire types =====

/// Request body for `generateContent`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

impl ContentRequest {
    /// A single-turn request made of the given parts.
    pub fn from_parts(parts: Vec<Part>) -> Self {
        Self {
            contents: vec![Content { parts }],
            generation_config: None,
        }
    }
}

/// One turn of content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// Either inline image data or text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    pub fn image(image: &ImageInput) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: Some(image.mime_type.clone()),
                data: image.data.clone(),
            }),
        }
    }
}

/// Base64 payload with its mime type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub data: String,
}

/// Generation options.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_config: Option<ImageConfig>,
}

/// Output image options.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_size: Option<String>,
}

/// Response body of `generateContent`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
}

impl ContentResponse {
    /// First inline image of the first candidate, if any.
    pub fn first_image(&self) -> Option<&InlineData> {
        self.candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .iter()
            .filter_map(|p| p.inline_data.as_ref())
            .find(|d| !d.data.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
}

// ===== Inputs and outputs =====

/// An uploaded image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageInput {
    /// Base64 payload without the `data:` prefix.
    pub data: String,
    pub mime_type: String,
}

impl ImageInput {
    pub fn new(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Parse a `data:<mime>;base64,<payload>` URL.
    pub fn from_data_url(url: &str) -> Result<Self> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| ImagingError::InvalidImage("not a data URL".into()))?;
        let (meta, data) = rest
            .split_once(',')
            .ok_or_else(|| ImagingError::InvalidImage("missing payload".into()))?;
        let mime_type = meta
            .strip_suffix(";base64")
            .ok_or_else(|| ImagingError::InvalidImage("payload is not base64".into()))?;

        Ok(Self::new(data, mime_type))
    }

    /// Check the payload decodes as base64 and the mime type is an image.
    pub fn validate(&self) -> Result<()> {
        if !self.mime_type.starts_with("image/") {
            return Err(ImagingError::InvalidImage(format!(
                "unsupported mime type {}",
                self.mime_type
            )));
        }
        BASE64
            .decode(self.data.as_bytes())
            .map_err(|e| ImagingError::InvalidImage(e.to_string()))?;
        Ok(())
    }
}

/// An image returned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedImage {
    pub mime_type: String,
    pub data: String,
}

impl GeneratedImage {
    /// Render as a `data:` URL.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// Enhancement flavours.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnhanceMode {
    #[default]
    General,
    Face,
    Denoise,
}

impl EnhanceMode {
    pub fn instruction(&self) -> &'static str {
        match self {
            EnhanceMode::General => "Enhance this image quality, increase sharpness, and fix details while strictly maintaining original content and TRANSPARENCY. Do NOT add a background or change the alpha channel.",
            EnhanceMode::Face => "Focus on enhancing facial features and skin while keeping the background transparent as in the original.",
            EnhanceMode::Denoise => "Remove noise while preserving the transparency and edges of the subject.",
        }
    }
}

/// Output aspect ratios accepted by the generator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "3:4")]
    Portrait,
    #[serde(rename = "4:3")]
    Landscape,
    #[serde(rename = "9:16")]
    Tall,
    #[serde(rename = "16:9")]
    Wide,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Portrait => "3:4",
            AspectRatio::Landscape => "4:3",
            AspectRatio::Tall => "9:16",
            AspectRatio::Wide => "16:9",
        }
    }
}

/// Output resolution, honoured only by pro models.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageQuality {
    #[default]
    #[serde(rename = "1K")]
    OneK,
    #[serde(rename = "2K")]
    TwoK,
    #[serde(rename = "4K")]
    FourK,
}

impl ImageQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageQuality::OneK => "1K",
            ImageQuality::TwoK => "2K",
            ImageQuality::FourK => "4K",
        }
    }
}

/// Parameters for text-to-image generation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationRequest {
    pub prompt: String,
    pub aspect_ratio: AspectRatio,
    pub quality: ImageQuality,
    pub negative_prompt: String,
    /// Art style, `none` or empty for no style.
    pub style: String,
}

// ===== Prompt construction =====

/// Build the editing instruction for a given intensity (0-100).
pub fn edit_prompt(prompt: &str, intensity: u8) -> String {
    let enhanced = format!("{}. {}", prompt, TRANSPARENCY_CLAUSE);

    if intensity < 30 {
        format!("Apply a subtle change: {}", enhanced)
    } else if intensity > 75 {
        format!("Transform creatively: {}", enhanced)
    } else {
        enhanced
    }
}

/// Build the enhancement instruction.
pub fn enhance_prompt(mode: EnhanceMode) -> String {
    format!(
        "{} Ensure the output is a PNG with transparency preserved.",
        mode.instruction()
    )
}

/// Build the generation prompt from subject, style and negative prompt.
pub fn generation_prompt(prompt: &str, style: &str, negative_prompt: &str) -> String {
    let mut result = prompt.to_string();
    if !style.is_empty() && style != "none" {
        result = format!("Art Style: {}. Subject: {}", style, result);
    }
    if !negative_prompt.is_empty() {
        result = format!("{}. AVOID THESE ELEMENTS: {}.", result, negative_prompt);
    }
    result
}

/// Build the image options; the size is only sent to pro models.
pub fn generation_config(
    aspect_ratio: AspectRatio,
    quality: ImageQuality,
    model: &str,
) -> GenerationConfig {
    GenerationConfig {
        image_config: Some(ImageConfig {
            aspect_ratio: Some(aspect_ratio.as_str().to_string()),
            image_size: model
                .contains("pro")
                .then(|| quality.as_str().to_string()),
        }),
    }
}

// ===== Client =====

/// A backend able to answer `generateContent` requests.
#[async_trait]
pub trait ImageApi: Send + Sync {
    async fn generate_content(&self, model: &str, request: &ContentRequest)
        -> Result<ContentResponse>;

    /// Check whether a key is accepted by the service.
    async fn test_api_key(&self, api_key: &str) -> bool;
}

/// Connection settings for [`GeminiClient`].
#[derive(Debug, Clone)]
pub struct ImagingConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl Default for ImagingConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            timeout: Duration::from_secs(120),
        }
    }
}

/// HTTP client for the Gemini REST API.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    config: ImagingConfig,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: ImagingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(format!("NanoBananaStudio/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { config, client })
    }

    pub fn has_api_key(&self) -> bool {
        self.config
            .api_key
            .as_deref()
            .is_some_and(|k| !k.trim().is_empty())
    }

    async fn send(
        &self,
        api_key: &str,
        model: &str,
        request: &ContentRequest,
    ) -> Result<ContentResponse> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            model
        );
        debug!(model, "Sending generateContent request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|b| b.error.message)
                .unwrap_or(body);
            return Err(ImagingError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json::<ContentResponse>().await?)
    }
}

#[async_trait]
impl ImageApi for GeminiClient {
    async fn generate_content(
        &self,
        model: &str,
        request: &ContentRequest,
    ) -> Result<ContentResponse> {
        let api_key = match self.config.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => key,
            _ => return Err(ImagingError::MissingApiKey),
        };
        self.send(api_key, model, request).await
    }

    async fn test_api_key(&self, api_key: &str) -> bool {
        if api_key.trim().is_empty() {
            return false;
        }
        let request = ContentRequest::from_parts(vec![Part::text("test")]);
        match self.send(api_key, KEY_TEST_MODEL, &request).await {
            Ok(_) => true,
            Err(e) => {
                debug!("API key test failed: {}", e);
                false
            }
        }
    }
}

/// The four studio operations on top of an [`ImageApi`].
#[derive(Clone)]
pub struct ImageStudio {
    api: Arc<dyn ImageApi>,
}

impl std::fmt::Debug for ImageStudio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageStudio").finish_non_exhaustive()
    }
}

impl ImageStudio {
    pub fn new(api: Arc<dyn ImageApi>) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &Arc<dyn ImageApi> {
        &self.api
    }

    /// Edit an image following a text instruction.
    pub async fn edit_image(
        &self,
        image: &ImageInput,
        prompt: &str,
        intensity: u8,
        model: &str,
    ) -> Result<GeneratedImage> {
        image.validate()?;
        let request = ContentRequest::from_parts(vec![
            Part::image(image),
            Part::text(edit_prompt(prompt, intensity)),
        ]);
        self.run(model, &request, None).await
    }

    /// Improve quality, faces or noise. Always yields a PNG.
    pub async fn enhance_image(
        &self,
        image: &ImageInput,
        mode: EnhanceMode,
        model: &str,
    ) -> Result<GeneratedImage> {
        image.validate()?;
        let request = ContentRequest::from_parts(vec![
            Part::image(image),
            Part::text(enhance_prompt(mode)),
        ]);
        self.run(model, &request, Some(FALLBACK_MIME)).await
    }

    /// Cut the subject out onto a transparent PNG.
    pub async fn remove_background(
        &self,
        image: &ImageInput,
        model: &str,
    ) -> Result<GeneratedImage> {
        image.validate()?;
        let request = ContentRequest::from_parts(vec![
            Part::image(image),
            Part::text(REMOVE_BACKGROUND_INSTRUCTION),
        ]);
        self.run(model, &request, Some(FALLBACK_MIME)).await
    }

    /// Create an image from a text description.
    pub async fn generate_image(
        &self,
        request: &GenerationRequest,
        model: &str,
    ) -> Result<GeneratedImage> {
        let prompt = generation_prompt(&request.prompt, &request.style, &request.negative_prompt);
        let mut body = ContentRequest::from_parts(vec![Part::text(prompt)]);
        body.generation_config = Some(generation_config(
            request.aspect_ratio,
            request.quality,
            model,
        ));
        self.run(model, &body, None).await
    }

    async fn run(
        &self,
        model: &str,
        request: &ContentRequest,
        forced_mime: Option<&str>,
    ) -> Result<GeneratedImage> {
        let response = self.api.generate_content(model, request).await?;

        let Some(inline) = response.first_image() else {
            warn!(model, "Image API returned no image data");
            return Err(ImagingError::NoImage);
        };

        let mime_type = forced_mime
            .map(str::to_string)
            .or_else(|| inline.mime_type.clone())
            .unwrap_or_else(|| FALLBACK_MIME.to_string());

        Ok(GeneratedImage {
            mime_type,
            data: inline.data.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records requests and replays a canned response.
    struct FakeApi {
        response: serde_json::Value,
        seen: Mutex<Vec<(String, serde_json::Value)>>,
    }

    impl FakeApi {
        fn new(response: serde_json::Value) -> Arc<Self> {
            Arc::new(Self {
                response,
                seen: Mutex::new(Vec::new()),
            })
        }

        fn last_request(&self) -> (String, serde_json::Value) {
            self.seen.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl ImageApi for FakeApi {
        async fn generate_content(
            &self,
            model: &str,
            request: &ContentRequest,
        ) -> Result<ContentResponse> {
            self.seen
                .lock()
                .unwrap()
                .push((model.to_string(), serde_json::to_value(request).unwrap()));
            Ok(serde_json::from_value(self.response.clone()).unwrap())
        }

        async fn test_api_key(&self, api_key: &str) -> bool {
            api_key == "good"
        }
    }

    fn image_response(mime: Option<&str>) -> serde_json::Value {
        let mut inline = serde_json::json!({"data": "aGVsbG8="});
        if let Some(mime) = mime {
            inline["mimeType"] = serde_json::json!(mime);
        }
        serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": "here"}, {"inlineData": inline}]}}]
        })
    }

    fn sample_image() -> ImageInput {
        ImageInput::new("aGVsbG8=", "image/png")
    }

    #[test]
    fn test_edit_prompt_intensity_bands() {
        let subtle = edit_prompt("make it blue", 10);
        assert!(subtle.starts_with("Apply a subtle change: make it blue. CRITICAL"));

        let normal = edit_prompt("make it blue", 50);
        assert!(normal.starts_with("make it blue. CRITICAL"));

        let creative = edit_prompt("make it blue", 90);
        assert!(creative.starts_with("Transform creatively: "));

        // Boundaries are exclusive
        assert!(edit_prompt("x", 30).starts_with("x."));
        assert!(edit_prompt("x", 75).starts_with("x."));
    }

    #[test]
    fn test_generation_prompt() {
        assert_eq!(generation_prompt("a cat", "none", ""), "a cat");
        assert_eq!(
            generation_prompt("a cat", "anime", ""),
            "Art Style: anime. Subject: a cat"
        );
        assert_eq!(
            generation_prompt("a cat", "anime", "dogs"),
            "Art Style: anime. Subject: a cat. AVOID THESE ELEMENTS: dogs."
        );
    }

    #[test]
    fn test_generation_config_size_only_for_pro() {
        let flash = generation_config(AspectRatio::Wide, ImageQuality::FourK, DEFAULT_IMAGE_MODEL);
        let flash_json = serde_json::to_value(&flash).unwrap();
        assert_eq!(flash_json["imageConfig"]["aspectRatio"], "16:9");
        assert!(flash_json["imageConfig"].get("imageSize").is_none());

        let pro = generation_config(
            AspectRatio::Square,
            ImageQuality::TwoK,
            "gemini-3-pro-image-preview",
        );
        let pro_json = serde_json::to_value(&pro).unwrap();
        assert_eq!(pro_json["imageConfig"]["imageSize"], "2K");
    }

    #[test]
    fn test_enhance_prompt_modes() {
        assert!(enhance_prompt(EnhanceMode::Face).starts_with("Focus on enhancing facial"));
        assert!(enhance_prompt(EnhanceMode::Denoise).ends_with("transparency preserved."));
    }

    #[test]
    fn test_data_url_parsing() {
        let image = ImageInput::from_data_url("data:image/jpeg;base64,aGVsbG8=").unwrap();
        assert_eq!(image.mime_type, "image/jpeg");
        assert_eq!(image.data, "aGVsbG8=");

        assert!(ImageInput::from_data_url("http://example.com/a.png").is_err());
        assert!(ImageInput::from_data_url("data:image/png,raw").is_err());
    }

    #[test]
    fn test_validate_rejects_bad_payloads() {
        assert!(sample_image().validate().is_ok());
        assert!(ImageInput::new("!!!", "image/png").validate().is_err());
        assert!(ImageInput::new("aGVsbG8=", "text/plain").validate().is_err());
    }

    #[test]
    fn test_first_image_skips_text_parts() {
        let response: ContentResponse =
            serde_json::from_value(image_response(Some("image/webp"))).unwrap();
        let inline = response.first_image().unwrap();
        assert_eq!(inline.mime_type.as_deref(), Some("image/webp"));

        let empty: ContentResponse = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(empty.first_image().is_none());
    }

    #[tokio::test]
    async fn test_edit_sends_image_then_text() {
        let api = FakeApi::new(image_response(Some("image/webp")));
        let studio = ImageStudio::new(api.clone());

        let result = studio
            .edit_image(&sample_image(), "add a hat", 50, DEFAULT_IMAGE_MODEL)
            .await
            .unwrap();
        assert_eq!(result.mime_type, "image/webp");
        assert_eq!(result.data_url(), "data:image/webp;base64,aGVsbG8=");

        let (model, body) = api.last_request();
        assert_eq!(model, DEFAULT_IMAGE_MODEL);
        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/png");
        assert!(parts[1]["text"].as_str().unwrap().starts_with("add a hat."));
        assert!(body.get("generationConfig").is_none());
    }

    #[tokio::test]
    async fn test_enhance_forces_png() {
        let api = FakeApi::new(image_response(Some("image/jpeg")));
        let studio = ImageStudio::new(api);

        let result = studio
            .enhance_image(&sample_image(), EnhanceMode::General, DEFAULT_IMAGE_MODEL)
            .await
            .unwrap();
        assert_eq!(result.mime_type, "image/png");
    }

    #[tokio::test]
    async fn test_generate_defaults_to_png_mime() {
        let api = FakeApi::new(image_response(None));
        let studio = ImageStudio::new(api.clone());

        let request = GenerationRequest {
            prompt: "a lighthouse".into(),
            style: "none".into(),
            ..Default::default()
        };
        let result = studio
            .generate_image(&request, DEFAULT_IMAGE_MODEL)
            .await
            .unwrap();
        assert_eq!(result.mime_type, "image/png");

        let (_, body) = api.last_request();
        assert_eq!(body["contents"][0]["parts"][0]["text"], "a lighthouse");
        assert_eq!(body["generationConfig"]["imageConfig"]["aspectRatio"], "1:1");
    }

    #[tokio::test]
    async fn test_missing_image_is_application_error() {
        let api = FakeApi::new(serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": "I cannot do that"}]}}]
        }));
        let studio = ImageStudio::new(api);

        let err = studio
            .remove_background(&sample_image(), DEFAULT_IMAGE_MODEL)
            .await
            .unwrap_err();
        assert!(matches!(err, ImagingError::NoImage));
        assert_eq!(
            err.user_message(ImageOperation::Removal),
            "لم يتمكن الذكاء الاصطناعي من معالجة الخلفية، جرب صورة أخرى."
        );
    }

    #[tokio::test]
    async fn test_invalid_upload_never_reaches_api() {
        let api = FakeApi::new(image_response(None));
        let studio = ImageStudio::new(api.clone());

        let err = studio
            .edit_image(&ImageInput::new("%%%", "image/png"), "x", 50, DEFAULT_IMAGE_MODEL)
            .await
            .unwrap_err();
        assert!(matches!(err, ImagingError::InvalidImage(_)));
        assert!(api.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_client_without_key_fails_before_request() {
        let client = GeminiClient::new(ImagingConfig {
            endpoint: "http://127.0.0.1:9".into(),
            ..Default::default()
        })
        .unwrap();
        assert!(!client.has_api_key());

        let request = ContentRequest::from_parts(vec![Part::text("hi")]);
        let err = client
            .generate_content(DEFAULT_IMAGE_MODEL, &request)
            .await
            .unwrap_err();
        assert!(matches!(err, ImagingError::MissingApiKey));
        assert_eq!(err.user_message(ImageOperation::Generation), "مفتاح API مفقود.");
    }

    #[tokio::test]
    async fn test_empty_key_never_passes_test() {
        let client = GeminiClient::new(ImagingConfig::default()).unwrap();
        assert!(!client.test_api_key("  ").await);
    }

    #[test]
    fn test_failure_messages_per_operation() {
        let err = ImagingError::Transport("connection reset".into());
        assert_eq!(err.user_message(ImageOperation::Editing), "فشل تعديل الصورة.");
        assert_eq!(err.user_message(ImageOperation::Generation), "فشل توليد الصورة.");
    }
}
