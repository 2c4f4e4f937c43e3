//! HTTP request handlers.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    response::sse::{Event, Sse},
};
use futures::Stream;
use tracing::{info, instrument};

use kinchat_files::FileGatewayError;

use super::error::{ApiError, ApiResult};
use super::state::AppState;
use crate::models::{
    AnalyzeRequest, AnalyzeResponse, ChatRequest, DEFAULT_ANALYZE_PROMPT, HealthResponse,
    ImageRequest, ImageResponse,
};
use crate::providers::InlineImage;
use crate::relay::{RelayError, relay, sse};

/// GET /api/health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// POST /api/chat - Relay a chat reply as server-sent events
#[instrument(skip(state, payload))]
pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, RelayError>> + Send + 'static>> {
    let Json(request) = payload?;
    let turns = request.into_turns();
    if turns.is_empty() {
        return Err(ApiError::bad_request("messages must not be empty"));
    }

    info!(provider = state.chat.name(), turns = turns.len(), "Relaying chat");
    let reply = state.chat.chat(&turns).await?;

    Ok(sse::into_sse(relay(reply)))
}

/// POST /api/image - Generate an image and store it under `generated/`
#[instrument(skip(state, payload))]
pub async fn generate_image(
    State(state): State<AppState>,
    payload: Result<Json<ImageRequest>, JsonRejection>,
) -> ApiResult<Json<ImageResponse>> {
    let Json(request) = payload?;
    let prompt = request.prompt.trim();
    if prompt.is_empty() {
        return Err(ApiError::bad_request("prompt is required"));
    }

    let source = match non_blank(request.source_image_url.as_deref()) {
        Some(url) => Some(load_image(&state, url).await?),
        None => None,
    };

    info!(edit = source.is_some(), "Generating image");
    let generated = state.images.generate_image(prompt, source).await?;

    let stored = state
        .files
        .store_generated(&generated.image.mime_type, &generated.image.data)
        .await
        .map_err(|err| match err {
            FileGatewayError::Io(_) => ApiError::from(err),
            other => ApiError::bad_gateway(format!("unusable image from upstream: {other}")),
        })?;

    Ok(Json(ImageResponse {
        image_url: stored.url,
        model: generated.model,
    }))
}

/// POST /api/analyze - Describe a stored image
#[instrument(skip(state, payload))]
pub async fn analyze_image(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> ApiResult<Json<AnalyzeResponse>> {
    let Json(request) = payload?;
    let Some(image_url) = non_blank(Some(request.image_url.as_str())) else {
        return Err(ApiError::bad_request("imageUrl is required"));
    };

    let image = load_image(&state, image_url).await?;
    let prompt = non_blank(request.prompt.as_deref()).unwrap_or(DEFAULT_ANALYZE_PROMPT);

    let text = state.images.analyze_image(prompt, image).await?;

    Ok(Json(AnalyzeResponse {
        success: true,
        text,
    }))
}

/// Read a stored image through the gateway by its URL.
async fn load_image(state: &AppState, url: &str) -> ApiResult<InlineImage> {
    let file = state.files.read_url(url).await?;
    Ok(InlineImage {
        mime_type: file.content_type,
        data: file.data,
    })
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
