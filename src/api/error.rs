use axum::{Json, http::StatusCode, response::IntoResponse};
use serde_json::json;
use thiserror::Error;

use super::models::{ErrorResponse, FailureResponse};
use crate::jobs::OrchestratorError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("payload invalid: {0}")]
    InvalidPayload(String),
    #[error("payload exceeds {0} bytes")]
    PayloadTooLarge(usize),
    #[error("job already active: {0}")]
    DuplicateJob(String),
    #[error("Download not found")]
    DownloadNotFound(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::DuplicateJob(_) => StatusCode::CONFLICT,
            ApiError::DownloadNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidPayload(_) => "INVALID_PAYLOAD",
            ApiError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            ApiError::DuplicateJob(_) => "DUPLICATE_JOB",
            ApiError::DownloadNotFound(_) => "NOT_FOUND",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();

        // Cancel keeps the `{success, error}` shape clients already poll for
        if let ApiError::DownloadNotFound(_) = self {
            let body = FailureResponse {
                success: false,
                error: self.to_string(),
                technical_error: None,
            };
            return (status, Json(body)).into_response();
        }

        let body = ErrorResponse {
            code: self.code(),
            message: self.to_string(),
        };
        (status, Json(json!(body))).into_response()
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(value: serde_json::Error) -> Self {
        ApiError::InvalidPayload(value.to_string())
    }
}

impl From<OrchestratorError> for ApiError {
    fn from(value: OrchestratorError) -> Self {
        match value {
            OrchestratorError::DuplicateJob(id) => ApiError::DuplicateJob(id),
            OrchestratorError::JobNotFound(id) => ApiError::DownloadNotFound(id),
        }
    }
}
