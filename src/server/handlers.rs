use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::ApiError;
use super::middleware::RequestId;
use super::AppState;
use crate::transcribe::{BatchResponse, TranscriptionResponse};
use crate::webhook::{WebhookEvent, BATCH_TRANSCRIPTION_COMPLETED, TRANSCRIPTION_COMPLETED};

#[derive(Debug, Deserialize)]
pub struct TranscribeRequest {
    pub url: Option<String>,
    pub webhook_url: Option<String>,
    pub webhook_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BatchTranscribeRequest {
    /// Kept loose so a non-array value is reported like a missing one
    pub urls: Option<Value>,
    pub webhook_url: Option<String>,
    pub webhook_secret: Option<String>,
}

#[derive(Serialize)]
pub struct BannerResponse {
    pub message: &'static str,
    pub instruction: &'static str,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

pub async fn banner_handler() -> impl IntoResponse {
    Json(BannerResponse {
        message: "Transcrify API is running.",
        instruction: "Send a POST request with { url: '...' } to transcribe video.",
    })
}

pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

pub async fn transcribe_handler(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    payload: Result<Json<TranscribeRequest>, JsonRejection>,
) -> Result<Json<TranscriptionResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest {
        message: e.body_text(),
    })?;

    let url = request
        .url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest {
            message: "URL is required".to_string(),
        })?;

    let response = state.pipeline.transcribe_url(&url).await.map_err(|e| {
        tracing::error!(request_id = %request_id, url = %url, error = %e, "Transcription request failed");
        ApiError::from(e)
    })?;

    if let Some(webhook_url) = non_empty(request.webhook_url) {
        let event = WebhookEvent::new(TRANSCRIPTION_COMPLETED, response.clone());
        state
            .notifier
            .dispatch(webhook_url, event, request.webhook_secret);
    }

    Ok(Json(response))
}

pub async fn batch_transcribe_handler(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    payload: Result<Json<BatchTranscribeRequest>, JsonRejection>,
) -> Result<Json<BatchResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest {
        message: e.body_text(),
    })?;

    let urls = parse_urls(request.urls).ok_or_else(|| ApiError::BadRequest {
        message: "URLs array is required and must not be empty".to_string(),
    })?;

    if urls.len() > state.max_batch_size {
        return Err(ApiError::BadRequest {
            message: format!("Batch size exceeds maximum of {}", state.max_batch_size),
        });
    }

    tracing::info!(request_id = %request_id, count = urls.len(), "Starting batch transcription");
    let batch = state.pipeline.transcribe_batch(&urls).await;
    tracing::info!(
        request_id = %request_id,
        completed = batch.completed,
        failed = batch.failed,
        "Batch transcription finished"
    );

    if let Some(webhook_url) = non_empty(request.webhook_url) {
        let event = WebhookEvent::new(BATCH_TRANSCRIPTION_COMPLETED, batch.clone());
        state
            .notifier
            .dispatch(webhook_url, event, request.webhook_secret);
    }

    Ok(Json(batch))
}

/// A non-empty JSON array; non-string entries are kept so they fail as items
fn parse_urls(value: Option<Value>) -> Option<Vec<String>> {
    let items = match value {
        Some(Value::Array(items)) if !items.is_empty() => items,
        _ => return None,
    };

    Some(
        items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .collect(),
    )
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
