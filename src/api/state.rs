use std::sync::Arc;

use crate::config::Config;
use crate::fetcher::{ThumbnailCache, YtDlpFetcher};
use crate::jobs::{JobOrchestrator, JobRegistry, ProgressChannel};
use crate::observability::Metrics;
use crate::picker::{DialogPicker, FolderPicker};
use crate::store::{JsonHistoryStore, JsonSettingsStore, SettingsStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub orchestrator: JobOrchestrator,
    pub progress: Arc<ProgressChannel>,
    pub picker: Arc<dyn FolderPicker>,
}

impl AppState {
    pub fn new(
        config: Config,
        orchestrator: JobOrchestrator,
        progress: Arc<ProgressChannel>,
        picker: Arc<dyn FolderPicker>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            orchestrator,
            progress,
            picker,
        }
    }

    /// Wire the yt-dlp fetcher and the JSON stores under `data_dir`
    pub fn from_config(config: Config) -> Self {
        let progress = Arc::new(ProgressChannel::new(config.events.channel_capacity));
        let settings: Arc<dyn SettingsStore> =
            Arc::new(JsonSettingsStore::new(config.settings_path()));
        let picker = DialogPicker::new(Some(settings.load().download_path));

        let orchestrator = JobOrchestrator::builder()
            .registry(Arc::new(JobRegistry::new()))
            .fetcher(Arc::new(YtDlpFetcher::new(config.fetcher.ytdlp_options())))
            .settings(settings)
            .history(Arc::new(JsonHistoryStore::new(config.history_path())))
            .progress(progress.clone())
            .thumbnails(ThumbnailCache::new(config.thumbnails_dir()))
            .metrics(Arc::new(Metrics::new()))
            .build();

        Self::new(config, orchestrator, progress, Arc::new(picker))
    }
}
