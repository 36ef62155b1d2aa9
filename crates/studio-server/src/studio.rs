//! Image operation handlers.

use std::future::Future;

use axum::extract::State;
use axum::Json;
use tracing::{info, warn};

use studio_core::imaging::{self, GeneratedImage, ImageInput, ImageOperation};
use studio_core::SessionToken;
use studio_storage::{NewProcess, ProcessStatus, GUEST_ACTION_LIMIT};

use crate::error::{ApiError, Result};
use crate::handlers::ensure_enabled_model;
use crate::models::{
    EditRequest, EnhanceRequest, GenerateRequest, ImageResponse, RemoveBackgroundRequest,
};
use crate::session::Client;
use crate::state::AppState;

/// Resolve the model for a request: an explicit enabled model, else the
/// configured active model.
fn resolve_model(state: &AppState, requested: Option<&str>) -> Result<String> {
    match requested.filter(|m| !m.is_empty()) {
        Some(id) => {
            ensure_enabled_model(&state.service, id)?;
            Ok(id.to_string())
        }
        None => Ok(state.service.get_settings().active_model),
    }
}

/// Parse and check an uploaded image before anything is logged for it.
fn decode_upload(operation: ImageOperation, data_url: &str) -> Result<ImageInput> {
    ImageInput::from_data_url(data_url)
        .and_then(|image| image.validate().map(|()| image))
        .map_err(|e| ApiError::imaging(operation, e))
}

fn require_prompt(prompt: &str) -> Result<()> {
    if prompt.trim().is_empty() {
        return Err(ApiError::BadRequest("يرجى كتابة وصف أولاً.".to_string()));
    }
    Ok(())
}

/// Run one operation for `client` through the guest gate, log it and count
/// guest usage.
async fn run_operation<F, Fut>(
    state: &AppState,
    client: &SessionToken,
    operation: ImageOperation,
    requested_model: Option<&str>,
    run: F,
) -> Result<Json<ImageResponse>>
where
    F: FnOnce(String) -> Fut,
    Fut: Future<Output = imaging::Result<GeneratedImage>>,
{
    let user = state.service.get_current_user(client);
    if user.is_none() && state.service.get_guest_action_count(client) >= GUEST_ACTION_LIMIT {
        info!(?operation, "Guest limit reached");
        return Err(ApiError::GuestLimitReached);
    }

    let model = resolve_model(state, requested_model)?;
    let result = run(model.clone()).await;

    let status = match result {
        Ok(_) => ProcessStatus::Success,
        Err(_) => ProcessStatus::Error,
    };
    let process = NewProcess::now(user.as_ref(), operation.into(), status, model.as_str());
    if let Err(e) = state.service.log_process(process).await {
        warn!("Failed to log process: {}", e);
    }

    let image = result.map_err(|e| ApiError::imaging(operation, e))?;

    let remaining = if user.is_none() {
        let count = state.service.increment_guest_action_count(client);
        Some(GUEST_ACTION_LIMIT.saturating_sub(count))
    } else {
        None
    };

    info!(?operation, %model, "Image operation succeeded");
    Ok(Json(ImageResponse::new(image, model, remaining)))
}

/// POST /api/studio/edit
pub async fn edit(
    State(state): State<AppState>,
    Client(client): Client,
    Json(req): Json<EditRequest>,
) -> Result<Json<ImageResponse>> {
    const OP: ImageOperation = ImageOperation::Editing;
    let EditRequest {
        image,
        prompt,
        intensity,
        model,
    } = req;
    require_prompt(&prompt)?;
    let image = decode_upload(OP, &image)?;
    let images = &state.images;

    run_operation(&state, &client, OP, model.as_deref(), |model| async move {
        images.edit_image(&image, &prompt, intensity, &model).await
    })
    .await
}

/// POST /api/studio/enhance
pub async fn enhance(
    State(state): State<AppState>,
    Client(client): Client,
    Json(req): Json<EnhanceRequest>,
) -> Result<Json<ImageResponse>> {
    const OP: ImageOperation = ImageOperation::Enhancement;
    let image = decode_upload(OP, &req.image)?;
    let (images, mode) = (&state.images, req.mode);

    run_operation(&state, &client, OP, req.model.as_deref(), |model| async move {
        images.enhance_image(&image, mode, &model).await
    })
    .await
}

/// POST /api/studio/remove-background
pub async fn remove_background(
    State(state): State<AppState>,
    Client(client): Client,
    Json(req): Json<RemoveBackgroundRequest>,
) -> Result<Json<ImageResponse>> {
    const OP: ImageOperation = ImageOperation::Removal;
    let image = decode_upload(OP, &req.image)?;
    let images = &state.images;

    run_operation(&state, &client, OP, req.model.as_deref(), |model| async move {
        images.remove_background(&image, &model).await
    })
    .await
}

/// POST /api/studio/generate
pub async fn generate(
    State(state): State<AppState>,
    Client(client): Client,
    Json(req): Json<GenerateRequest>,
) -> Result<Json<ImageResponse>> {
    require_prompt(&req.generation.prompt)?;
    let (images, generation) = (&state.images, &req.generation);

    run_operation(
        &state,
        &client,
        ImageOperation::Generation,
        req.model.as_deref(),
        |model| async move { images.generate_image(generation, &model).await },
    )
    .await
}
