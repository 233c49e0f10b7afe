#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::broadcast;

use clipfetch::fetcher::{
    FetchError, FetchProgress, FetchRequest, FetchedMedia, MediaFetcher, MediaInfo, ProgressHook,
};
use clipfetch::jobs::{
    DownloadRequest, FormatChoice, JobOrchestrator, JobRegistry, ProgressChannel, ProgressEvent,
    Quality,
};
use clipfetch::observability::Metrics;
use clipfetch::store::{
    Credentials, HistoryRecord, HistoryStore, JsonHistoryStore, JsonSettingsStore, Settings,
    SettingsStore, StoreError,
};

/// What the scripted fetcher does on one attempt
#[derive(Debug, Clone)]
pub enum Step {
    Succeed,
    Fail(&'static str),
    /// Report `ticks` progress updates, a finished marker, then succeed
    Progress { ticks: u64 },
    /// Report progress every few milliseconds until the hook aborts
    Block,
    /// Cancel the job through the registry just before reporting success
    SucceedAfterCancel(&'static str),
}

/// MediaFetcher that plays back a fixed list of attempt outcomes
///
/// Once the script runs out every further attempt succeeds.
pub struct ScriptedFetcher {
    steps: Mutex<VecDeque<Step>>,
    calls: AtomicUsize,
    probe: Mutex<Result<MediaInfo, String>>,
    registry: OnceLock<Arc<JobRegistry>>,
    last_request: Mutex<Option<FetchRequest>>,
}

impl ScriptedFetcher {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into_iter().collect()),
            calls: AtomicUsize::new(0),
            probe: Mutex::new(Err("ERROR: no probe scripted".to_string())),
            registry: OnceLock::new(),
            last_request: Mutex::new(None),
        }
    }

    pub fn with_probe(self, result: Result<MediaInfo, String>) -> Self {
        *self.probe.lock().unwrap() = result;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<FetchRequest> {
        self.last_request.lock().unwrap().clone()
    }

    fn attach(&self, registry: Arc<JobRegistry>) {
        let _ = self.registry.set(registry);
    }
}

pub fn media(title: &str) -> FetchedMedia {
    FetchedMedia {
        title: title.to_string(),
        source_url: format!("https://video.example/{}", title),
        thumbnail_url: Some(format!("https://img.example/{}.jpg", title)),
        duration_seconds: 212.0,
        filesize_bytes: 4_200_000,
    }
}

#[async_trait]
impl MediaFetcher for ScriptedFetcher {
    async fn probe(&self, _target: &str, _credentials: &Credentials) -> Result<MediaInfo, FetchError> {
        self.probe.lock().unwrap().clone().map_err(FetchError::Failed)
    }

    async fn fetch(&self, request: FetchRequest, progress: ProgressHook) -> Result<FetchedMedia, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request);
        let step = self.steps.lock().unwrap().pop_front().unwrap_or(Step::Succeed);

        match step {
            Step::Succeed => Ok(media("clip")),
            Step::Fail(message) => Err(FetchError::Failed(message.to_string())),
            Step::Progress { ticks } => {
                for tick in 1..=ticks {
                    progress(FetchProgress::Downloading {
                        downloaded: tick * 100,
                        total: Some(ticks * 100),
                        total_estimate: None,
                        speed: Some(1024.0),
                        eta: Some(ticks - tick),
                    })?;
                    tokio::task::yield_now().await;
                }
                progress(FetchProgress::Finished)?;
                Ok(media("clip"))
            }
            Step::Block => {
                let mut downloaded = 0;
                loop {
                    downloaded += 1024;
                    progress(FetchProgress::Downloading {
                        downloaded,
                        total: None,
                        total_estimate: Some(1 << 30),
                        speed: None,
                        eta: None,
                    })?;
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            }
            Step::SucceedAfterCancel(job_id) => {
                if let Some(registry) = self.registry.get() {
                    registry.cancel(job_id);
                }
                Ok(media("clip"))
            }
        }
    }
}

/// JSON history whose `push` takes a fixed extra time
pub struct SlowHistory {
    inner: JsonHistoryStore,
    push_delay: Duration,
}

impl HistoryStore for SlowHistory {
    fn load(&self) -> Vec<HistoryRecord> {
        self.inner.load()
    }

    fn save(&self, records: &[HistoryRecord]) -> Result<(), StoreError> {
        self.inner.save(records)
    }

    fn push(&self, record: HistoryRecord) -> Result<(), StoreError> {
        std::thread::sleep(self.push_delay);
        self.inner.push(record)
    }
}

pub struct Harness {
    pub orchestrator: JobOrchestrator,
    pub registry: Arc<JobRegistry>,
    pub progress: Arc<ProgressChannel>,
    pub history: Arc<SlowHistory>,
    pub settings: Arc<JsonSettingsStore>,
    pub fetcher: Arc<ScriptedFetcher>,
    pub metrics: Arc<Metrics>,
    pub dir: TempDir,
}

/// Orchestrator over real JSON stores in a temp dir; retries are immediate
pub fn harness(fetcher: ScriptedFetcher, max_retries: u32) -> Harness {
    harness_with_push_delay(fetcher, max_retries, Duration::ZERO)
}

pub fn harness_with_push_delay(
    fetcher: ScriptedFetcher,
    max_retries: u32,
    push_delay: Duration,
) -> Harness {
    let dir = TempDir::new().unwrap();

    let settings = Arc::new(JsonSettingsStore::new(dir.path().join("config.json")));
    settings
        .save(&Settings {
            credentials: Credentials::default(),
            download_path: dir.path().join("downloads"),
            max_retries,
            retry_delay: 0,
        })
        .unwrap();

    let history = Arc::new(SlowHistory {
        inner: JsonHistoryStore::new(dir.path().join("history.json")),
        push_delay,
    });
    let registry = Arc::new(JobRegistry::new());
    let progress = Arc::new(ProgressChannel::new(1024));
    let metrics = Arc::new(Metrics::new());
    let fetcher = Arc::new(fetcher);
    fetcher.attach(registry.clone());

    let orchestrator = JobOrchestrator::builder()
        .registry(registry.clone())
        .fetcher(fetcher.clone())
        .settings(settings.clone())
        .history(history.clone())
        .progress(progress.clone())
        .metrics(metrics.clone())
        .build();

    Harness {
        orchestrator,
        registry,
        progress,
        history,
        settings,
        fetcher,
        metrics,
        dir,
    }
}

pub fn request(job_id: &str) -> DownloadRequest {
    DownloadRequest {
        job_id: job_id.to_string(),
        target: "https://video.example/watch?v=abc".to_string(),
        format: FormatChoice::Video,
        quality: Quality::MaxHeight(1080),
    }
}

/// Next event for `job_id`, failing the test after five seconds
pub async fn next_event(rx: &mut broadcast::Receiver<ProgressEvent>, job_id: &str) -> ProgressEvent {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = rx.recv().await.expect("progress channel closed");
            if event.job_id == job_id {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for a progress event")
}

/// All events for `job_id` up to and including the terminal one
pub async fn collect_until_terminal(
    rx: &mut broadcast::Receiver<ProgressEvent>,
    job_id: &str,
) -> Vec<ProgressEvent> {
    let mut events = Vec::new();
    loop {
        let event = next_event(rx, job_id).await;
        let done = event.is_terminal();
        events.push(event);
        if done {
            return events;
        }
    }
}

/// Poll until the registry no longer holds `job_id`
pub async fn wait_until_removed(registry: &JobRegistry, job_id: &str) {
    wait_until(|| !registry.contains(job_id)).await;
}

/// Poll `condition` every few milliseconds, failing the test after five seconds
pub async fn wait_until(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition never held");
}
