//! Tracing setup and job counters

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber
///
/// Honors `RUST_LOG`, defaulting to `info`. Safe to call more than once.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Process-wide job counters
#[derive(Debug, Default)]
pub struct Metrics {
    jobs_started: AtomicU64,
    jobs_completed: AtomicU64,
    jobs_failed: AtomicU64,
    jobs_cancelled: AtomicU64,
    retries_scheduled: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn job_started(&self) {
        self.bump(&self.jobs_started, "jobs_started");
    }

    pub fn job_completed(&self) {
        self.bump(&self.jobs_completed, "jobs_completed");
    }

    pub fn job_failed(&self) {
        self.bump(&self.jobs_failed, "jobs_failed");
    }

    pub fn job_cancelled(&self) {
        self.bump(&self.jobs_cancelled, "jobs_cancelled");
    }

    pub fn retry_scheduled(&self) {
        self.bump(&self.retries_scheduled, "retries_scheduled");
    }

    fn bump(&self, counter: &AtomicU64, name: &'static str) {
        counter.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = name, "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            jobs_started: self.jobs_started.load(Ordering::Relaxed),
            jobs_completed: self.jobs_completed.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            jobs_cancelled: self.jobs_cancelled.load(Ordering::Relaxed),
            retries_scheduled: self.retries_scheduled.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub jobs_started: u64,
    pub jobs_completed: u64,
    pub jobs_failed: u64,
    pub jobs_cancelled: u64,
    pub retries_scheduled: u64,
}
