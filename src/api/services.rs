use std::convert::Infallible;

use axum::{
    Json,
    extract::{Path, Query, State, rejection::QueryRejection},
    http::{HeaderMap, StatusCode},
    response::{
        IntoResponse,
        sse::{Event as SseEvent, KeepAlive, Sse},
    },
};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use tokio_stream::{StreamExt, wrappers::BroadcastStream};
use uuid::Uuid;

use super::{
    models::{
        FailureResponse, FolderResponse, HealthResponse, InfoQuery, InfoResponse,
        StartDownloadRequest, StartDownloadResponse, SuccessResponse,
    },
    state::AppState,
    utils::require_json,
    validation::{validate_settings, validate_start_request, validate_url},
};
use crate::api::error::ApiError;
use crate::jobs::{DownloadRequest, classify};
use crate::store::Settings;

/// Submit a download (POST /downloads)
///
/// The job runs in the background; follow it on `GET /events`.
/// A client-supplied `job_id` that is still active is rejected with 409.
pub async fn start_download(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Body,
) -> Result<impl IntoResponse, ApiError> {
    require_json(&headers)?;
    let body_bytes = read_body(body, state.config.server.max_payload_bytes.as_u64()).await?;

    let payload: StartDownloadRequest = serde_json::from_slice(&body_bytes)?;
    validate_start_request(&payload).map_err(|e| ApiError::InvalidPayload(e.to_string()))?;

    let request = DownloadRequest {
        job_id: payload
            .job_id
            .unwrap_or_else(|| Uuid::now_v7().to_string()),
        target: payload.url.trim().to_string(),
        format: payload.format,
        quality: payload.quality,
    };
    let job_id = state.orchestrator.start_download(request)?;

    let response = StartDownloadResponse {
        success: true,
        job_id,
    };
    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// Request cancellation (DELETE /downloads/{job_id})
pub async fn cancel_download(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.orchestrator.cancel_download(&job_id)?;
    Ok(Json(SuccessResponse::ok()))
}

/// Active jobs, oldest first (GET /downloads)
pub async fn list_downloads(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.orchestrator.registry().snapshot())
}

/// Progress stream (GET /events)
///
/// One `progress` event per ProgressEvent. A subscriber that falls behind
/// the channel capacity gets an `error` event with the number skipped.
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let stream = BroadcastStream::new(state.progress.subscribe());

    let sse_stream = stream.filter_map(|result| match result {
        Ok(event) => match serde_json::to_string(&event) {
            Ok(json_data) => Some(Ok(SseEvent::default().event("progress").data(json_data))),
            Err(e) => {
                tracing::warn!("Failed to serialize progress event: {}", e);
                None
            }
        },
        Err(tokio_stream::wrappers::errors::BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!("SSE client lagged, skipped {} events", skipped);
            Some(Ok(SseEvent::default().event("error").data(format!(
                r#"{{"error":"lagged","skipped":{}}}"#,
                skipped
            ))))
        }
    });

    Sse::new(sse_stream).keep_alive(KeepAlive::default())
}

/// Metadata and format list for a URL (GET /info?url=)
///
/// Probe failures are reported in the body with `success: false`.
pub async fn get_info(
    State(state): State<AppState>,
    query: Result<Query<InfoQuery>, QueryRejection>,
) -> Result<axum::response::Response, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::InvalidPayload(e.body_text()))?;
    validate_url(&query.url).map_err(|e| ApiError::InvalidPayload(e.to_string()))?;

    match state.orchestrator.probe(query.url.trim()).await {
        Ok(info) => Ok(Json(InfoResponse {
            success: true,
            info,
        })
        .into_response()),
        Err(e) => {
            let raw = e.to_string();
            tracing::warn!(url = %query.url, error = %raw, "Metadata probe failed");
            Ok(Json(FailureResponse {
                success: false,
                error: classify(&raw).user_message(),
                technical_error: Some(raw),
            })
            .into_response())
        }
    }
}

/// Download history, most recent first (GET /history)
pub async fn get_history(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let history = state.orchestrator.history().clone();
    Ok(Json(blocking(move || history.load()).await?))
}

/// DELETE /history
pub async fn clear_history(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let history = state.orchestrator.history().clone();
    blocking(move || history.clear())
        .await?
        .map_err(|e| ApiError::Internal(format!("Failed to clear history: {}", e)))?;
    Ok(Json(SuccessResponse::ok()))
}

/// GET /settings
pub async fn get_settings(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let settings = state.orchestrator.settings().clone();
    Ok(Json(blocking(move || settings.load()).await?))
}

/// Replace the user settings (PUT /settings)
///
/// Takes effect for jobs started afterwards.
pub async fn save_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Body,
) -> Result<impl IntoResponse, ApiError> {
    require_json(&headers)?;
    let body_bytes = read_body(body, state.config.server.max_payload_bytes.as_u64()).await?;

    let settings: Settings = serde_json::from_slice(&body_bytes)?;
    validate_settings(&settings).map_err(|e| ApiError::InvalidPayload(e.to_string()))?;

    let store = state.orchestrator.settings().clone();
    blocking(move || store.save(&settings))
        .await?
        .map_err(|e| ApiError::Internal(format!("Failed to save settings: {}", e)))?;

    Ok(Json(SuccessResponse::ok()))
}

/// Open the native folder dialog (POST /settings/folder)
pub async fn pick_folder(State(state): State<AppState>) -> impl IntoResponse {
    let path = state
        .picker
        .pick_folder()
        .await
        .map(|p| p.to_string_lossy().to_string());
    Json(FolderResponse { path })
}

/// Liveness plus job counters (GET /health)
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        active_jobs: state.orchestrator.registry().len(),
        metrics: state.orchestrator.metrics().snapshot(),
    };

    (StatusCode::OK, Json(response))
}

/// Collect the (already decompressed) body, stopping once it exceeds `max_size`
async fn read_body(body: axum::body::Body, max_size: u64) -> Result<Vec<u8>, ApiError> {
    let limit = usize::try_from(max_size).unwrap_or(usize::MAX);
    let data = Limited::new(body, limit)
        .collect()
        .await
        .map_err(|err| {
            if err.downcast_ref::<LengthLimitError>().is_some() {
                ApiError::PayloadTooLarge(limit)
            } else {
                ApiError::Internal(err.to_string())
            }
        })?
        .to_bytes()
        .to_vec();

    Ok(data)
}

/// Run store I/O on the blocking pool
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))
}
