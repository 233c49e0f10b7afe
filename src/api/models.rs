//! Request and response bodies for the HTTP surface
//!
//! Submitting a download (`POST /downloads`):
//!
//! ```json
//! {
//!   "url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
//!   "format": "video",
//!   "quality": 1080,
//!   "job_id": "optional-client-chosen-id"
//! }
//! ```
//!
//! `format` is `video` or `audio`; `quality` is a maximum height or
//! `"best"`. Progress for the job is then streamed from `GET /events`.

use serde::{Deserialize, Serialize};

use crate::fetcher::MediaInfo;
use crate::jobs::{FormatChoice, Quality};
use crate::observability::MetricsSnapshot;

#[derive(Debug, Deserialize, Clone)]
pub struct StartDownloadRequest {
    pub url: String,
    #[serde(default = "default_format")]
    pub format: FormatChoice,
    #[serde(default)]
    pub quality: Quality,
    #[serde(default)]
    pub job_id: Option<String>,
}

fn default_format() -> FormatChoice {
    FormatChoice::Video
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StartDownloadResponse {
    pub success: bool,
    pub job_id: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FailureResponse {
    pub success: bool,
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technical_error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InfoQuery {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct InfoResponse {
    pub success: bool,
    #[serde(flatten)]
    pub info: MediaInfo,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FolderResponse {
    pub path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub active_jobs: usize,
    pub metrics: MetricsSnapshot,
}
