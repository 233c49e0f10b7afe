use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::classify::classify;
use super::progress::{ProgressEvent, ProgressSink, ProgressStatus};
use super::registry::{JobRegistry, RegistryError};
use super::types::{DownloadRequest, JobState};
use crate::fetcher::{
    FetchAborted, FetchError, FetchProgress, FetchRequest, FetchedMedia, MediaFetcher, MediaInfo,
    ProgressHook, ThumbnailCache,
};
use crate::observability::Metrics;
use crate::store::{HistoryRecord, HistoryStore, Settings, SettingsStore};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrchestratorError {
    #[error("job already active: {0}")]
    DuplicateJob(String),

    #[error("Download not found")]
    JobNotFound(String),
}

impl From<RegistryError> for OrchestratorError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::DuplicateJob(id) => OrchestratorError::DuplicateJob(id),
        }
    }
}

/// Runs download jobs in the background with retries and cooperative cancellation
///
/// Each job gets its own task, started at submission and running until a
/// terminal outcome. The task is supervised: if it dies unexpectedly the job
/// is still deregistered and reported as failed.
#[derive(Clone)]
pub struct JobOrchestrator {
    registry: Arc<JobRegistry>,
    fetcher: Arc<dyn MediaFetcher>,
    settings: Arc<dyn SettingsStore>,
    history: Arc<dyn HistoryStore>,
    progress: Arc<dyn ProgressSink>,
    thumbnails: Option<ThumbnailCache>,
    metrics: Arc<Metrics>,
}

#[bon::bon]
impl JobOrchestrator {
    #[builder]
    pub fn new(
        registry: Arc<JobRegistry>,
        fetcher: Arc<dyn MediaFetcher>,
        settings: Arc<dyn SettingsStore>,
        history: Arc<dyn HistoryStore>,
        progress: Arc<dyn ProgressSink>,
        thumbnails: Option<ThumbnailCache>,
        metrics: Option<Arc<Metrics>>,
    ) -> Self {
        Self {
            registry,
            fetcher,
            settings,
            history,
            progress,
            thumbnails,
            metrics: metrics.unwrap_or_default(),
        }
    }
}

impl JobOrchestrator {
    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn settings(&self) -> &Arc<dyn SettingsStore> {
        &self.settings
    }

    pub fn history(&self) -> &Arc<dyn HistoryStore> {
        &self.history
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Submit a job and return immediately
    ///
    /// Progress and the terminal outcome arrive through the progress sink.
    /// Must be called from within a Tokio runtime.
    pub fn start_download(&self, request: DownloadRequest) -> Result<String, OrchestratorError> {
        self.registry.register(&request)?;
        self.metrics.job_started();

        let job_id = request.job_id.clone();
        info!(
            job_id = %job_id,
            url = %request.target,
            format = %request.format,
            quality = %request.quality,
            "Download registered"
        );

        let supervisor = self.clone();
        tokio::spawn(async move {
            let job_id = request.job_id.clone();
            let settings = supervisor.load_settings().await;
            let worker = tokio::spawn(supervisor.clone().run(request, settings));

            if let Err(e) = worker.await {
                error!(job_id = %job_id, error = %e, "Download task ended abnormally");
                supervisor.registry.remove(&job_id);
                supervisor.metrics.job_failed();
                supervisor.emit(
                    ProgressEvent::builder()
                        .job_id(job_id)
                        .status(ProgressStatus::Error)
                        .message("Download failed: internal error")
                        .technical_error(e.to_string())
                        .build(),
                );
            }
        });

        Ok(job_id)
    }

    /// Request cooperative cancellation of an active job
    ///
    /// Returns once the flag is set; the job stops at its next checkpoint.
    pub fn cancel_download(&self, job_id: &str) -> Result<(), OrchestratorError> {
        if !self.registry.cancel(job_id) {
            return Err(OrchestratorError::JobNotFound(job_id.to_string()));
        }

        info!(job_id, "Download marked for cancellation");
        self.emit(
            ProgressEvent::builder()
                .job_id(job_id)
                .status(ProgressStatus::Cancelling)
                .message("Cancelling download...")
                .build(),
        );
        Ok(())
    }

    /// Read metadata and the negotiated format list for a target
    pub async fn probe(&self, target: &str) -> Result<MediaInfo, FetchError> {
        let settings = self.load_settings().await;
        self.fetcher.probe(target, &settings.credentials).await
    }

    /// Settings snapshot read off the async workers; defaults if the read task dies
    async fn load_settings(&self) -> Settings {
        let store = self.settings.clone();
        match tokio::task::spawn_blocking(move || store.load()).await {
            Ok(settings) => settings,
            Err(e) => {
                warn!(error = %e, "Settings read failed, using defaults");
                Settings::default()
            }
        }
    }

    async fn run(self, request: DownloadRequest, settings: Settings) {
        let job_id = request.job_id.as_str();
        let policy = settings.retry_policy();
        debug!(job_id, max_retries = policy.max_retries, "Download task started");
        let fetch_request = FetchRequest {
            target: request.target.clone(),
            format: request.format,
            quality: request.quality,
            output_dir: settings.download_path.clone(),
            credentials: settings.credentials.clone(),
        };

        for attempt in 0..policy.max_retries {
            if self.registry.is_cancelled(job_id) {
                info!(job_id, attempt = attempt + 1, "Download cancelled before attempt");
                self.finish_cancelled(job_id);
                return;
            }

            if attempt > 0 {
                self.registry.set_state(job_id, JobState::Retrying);
                self.metrics.retry_scheduled();
                self.emit(
                    ProgressEvent::builder()
                        .job_id(job_id)
                        .status(ProgressStatus::Retrying)
                        .message(format!(
                            "Retry attempt {} of {}...",
                            attempt + 1,
                            policy.max_retries
                        ))
                        .retry_count(attempt + 1)
                        .build(),
                );

                tokio::time::sleep(policy.retry_delay).await;

                if self.registry.is_cancelled(job_id) {
                    info!(job_id, attempt = attempt + 1, "Download cancelled during retry delay");
                    self.finish_cancelled(job_id);
                    return;
                }
                self.registry.set_state(job_id, JobState::Running);
            }

            let outcome = self
                .fetcher
                .fetch(fetch_request.clone(), self.progress_hook(job_id))
                .await;

            match outcome {
                Ok(media) => {
                    // Past this point a cancel finds no job and is rejected
                    if !self.registry.finish_unless_cancelled(job_id) {
                        info!(job_id, "Download cancelled after completion");
                        self.finish_cancelled(job_id);
                        return;
                    }

                    self.record_history(&request, &media).await;
                    self.metrics.job_completed();
                    self.emit(
                        ProgressEvent::builder()
                            .job_id(job_id)
                            .status(ProgressStatus::Completed)
                            .percent(100.0)
                            .message("✓ Download completed successfully!")
                            .build(),
                    );
                    info!(job_id, title = %media.title, "Download completed");
                    return;
                }
                Err(err) => {
                    let raw = err.to_string();
                    let kind = classify(&raw);

                    if kind.is_cancellation() || self.registry.is_cancelled(job_id) {
                        info!(job_id, "Download cancelled");
                        self.finish_cancelled(job_id);
                        return;
                    }

                    if attempt + 1 < policy.max_retries {
                        info!(job_id, attempt = attempt + 1, error = %raw, "Download attempt failed");
                        continue;
                    }

                    warn!(job_id, attempts = attempt + 1, error = %raw, "Download failed");
                    self.registry.remove(job_id);
                    self.metrics.job_failed();
                    self.emit(
                        ProgressEvent::builder()
                            .job_id(job_id)
                            .status(ProgressStatus::Error)
                            .message(kind.user_message())
                            .technical_error(raw)
                            .retry_count(attempt + 1)
                            .build(),
                    );
                    return;
                }
            }
        }
    }

    fn finish_cancelled(&self, job_id: &str) {
        self.registry.remove(job_id);
        self.metrics.job_cancelled();
        self.emit(
            ProgressEvent::builder()
                .job_id(job_id)
                .status(ProgressStatus::Cancelled)
                .message("Download cancelled by user")
                .build(),
        );
    }

    fn emit(&self, event: ProgressEvent) {
        self.progress.emit(event);
    }

    /// Hook handed to the fetcher; every call is a cancellation checkpoint
    fn progress_hook(&self, job_id: &str) -> ProgressHook {
        let registry = self.registry.clone();
        let sink = self.progress.clone();
        let job_id = job_id.to_string();

        Arc::new(move |update: FetchProgress| {
            if registry.is_cancelled(&job_id) {
                return Err(FetchAborted);
            }
            if let Some(event) = progress_event(&job_id, update) {
                sink.emit(event);
            }
            Ok(())
        })
    }

    async fn record_history(&self, request: &DownloadRequest, media: &FetchedMedia) {
        let remote = media.thumbnail_url.clone().unwrap_or_default();
        let thumbnail_path = match (&self.thumbnails, &media.thumbnail_url) {
            (Some(cache), Some(url)) => cache
                .fetch(url, &media.title)
                .await
                .map(|path| path.to_string_lossy().to_string())
                .unwrap_or(remote),
            _ => remote,
        };

        let record = HistoryRecord {
            title: media.title.clone(),
            source_url: media.source_url.clone(),
            thumbnail_path,
            duration_seconds: media.duration_seconds,
            timestamp: chrono::Utc::now(),
            format_label: request.format_label(),
            filesize_bytes: media.filesize_bytes,
        };

        let history = self.history.clone();
        match tokio::task::spawn_blocking(move || history.push(record)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(job_id = %request.job_id, error = %e, "Failed to add to history"),
            Err(e) => error!(job_id = %request.job_id, error = %e, "History write task failed"),
        }
    }
}

/// Shape a fetch-level update into a progress event
///
/// Transfer updates are only forwarded once a total size is known.
fn progress_event(job_id: &str, update: FetchProgress) -> Option<ProgressEvent> {
    match update {
        FetchProgress::Downloading {
            downloaded,
            total,
            total_estimate,
            speed,
            eta,
        } => {
            let total = total.or(total_estimate).filter(|t| *t > 0)?;
            let percent = (downloaded as f64 / total as f64 * 100.0).min(100.0);

            Some(
                ProgressEvent::builder()
                    .job_id(job_id)
                    .status(ProgressStatus::Downloading)
                    .percent(percent)
                    .downloaded(downloaded)
                    .total(total)
                    .speed(speed.unwrap_or(0.0))
                    .eta(eta.unwrap_or(0))
                    .build(),
            )
        }
        FetchProgress::Finished => Some(
            ProgressEvent::builder()
                .job_id(job_id)
                .status(ProgressStatus::Processing)
                .percent(100.0)
                .message("Merging video and audio streams...")
                .build(),
        ),
    }
}
