//! Media fetch capability
//!
//! The orchestrator treats fetching as a black box behind [`MediaFetcher`]:
//! it hands over a target, a format choice and a progress hook, and gets back
//! result metadata or a failure. The only way to stop a fetch early is for the
//! hook to return [`FetchAborted`], which the fetcher must honor by tearing
//! down its work and returning [`FetchError::Aborted`].
//!
//! ## Key Components
//!
//! - [`MediaFetcher`] - the fetch/probe trait
//! - [`YtDlpFetcher`] - implementation backed by the `yt-dlp` executable
//! - [`formats::build_format_list`] - format negotiation for probes
//! - [`ThumbnailCache`] - saves thumbnails next to downloads

pub mod formats;
mod thumbnail;
mod ytdlp;

pub use formats::{FormatOption, RawFormat};
pub use thumbnail::{ThumbnailCache, sanitize_filename};
pub use ytdlp::{YtDlpFetcher, YtDlpOptions};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use crate::jobs::{FormatChoice, Quality};
use crate::store::Credentials;

/// Signal returned by a progress hook to stop the fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Download cancelled by user")]
pub struct FetchAborted;

#[derive(Debug, Error)]
pub enum FetchError {
    /// The progress hook asked to stop
    #[error("Download cancelled by user")]
    Aborted,

    #[error("failed to launch {tool}: {source}")]
    Launch {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// The fetch ran and failed; carries the raw technical message
    #[error("{0}")]
    Failed(String),

    #[error("invalid metadata: {0}")]
    InvalidMetadata(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<FetchAborted> for FetchError {
    fn from(_: FetchAborted) -> Self {
        FetchError::Aborted
    }
}

/// Fetch-level progress reported by a [`MediaFetcher`]
#[derive(Debug, Clone, PartialEq)]
pub enum FetchProgress {
    Downloading {
        downloaded: u64,
        total: Option<u64>,
        total_estimate: Option<u64>,
        speed: Option<f64>,
        eta: Option<u64>,
    },
    /// The transfer is done and post-processing (merge/extract) started
    Finished,
}

/// Callback invoked by the fetcher for every progress update
pub type ProgressHook = Arc<dyn Fn(FetchProgress) -> Result<(), FetchAborted> + Send + Sync>;

/// Everything a fetcher needs to perform one attempt
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub target: String,
    pub format: FormatChoice,
    pub quality: Quality,
    pub output_dir: PathBuf,
    pub credentials: Credentials,
}

/// Metadata about a fetched item
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchedMedia {
    pub title: String,
    pub source_url: String,
    pub thumbnail_url: Option<String>,
    pub duration_seconds: f64,
    pub filesize_bytes: u64,
}

/// Probe result for a target, with the negotiated format list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub title: String,
    pub thumbnail: String,
    pub duration: f64,
    pub uploader: String,
    pub description: String,
    pub formats: Vec<FormatOption>,
    pub url: String,
    pub video_id: String,
    pub view_count: u64,
    pub upload_date: String,
}

#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Read metadata without downloading
    async fn probe(&self, target: &str, credentials: &Credentials) -> Result<MediaInfo, FetchError>;

    /// Perform one fetch attempt
    ///
    /// Implementations must call `progress` for each update they observe and
    /// stop with [`FetchError::Aborted`] as soon as it returns an error.
    async fn fetch(
        &self,
        request: FetchRequest,
        progress: ProgressHook,
    ) -> Result<FetchedMedia, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::classify::{FailureKind, classify};

    #[test]
    fn test_aborted_classifies_as_cancellation() {
        let err: FetchError = FetchAborted.into();
        assert!(matches!(err, FetchError::Aborted));
        assert_eq!(classify(&err.to_string()), FailureKind::UserCancelled);
    }

    #[test]
    fn test_failed_keeps_raw_message() {
        let err = FetchError::Failed("ERROR: HTTP Error 404: Not Found".to_string());
        assert_eq!(err.to_string(), "ERROR: HTTP Error 404: Not Found");
    }
}
