use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tracing::debug;

use super::types::{DownloadRequest, FormatChoice, JobState, Quality};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("job already active: {0}")]
    DuplicateJob(String),
}

/// Per-job cancellation flag shared between the registry and the job's task
///
/// The flag is monotonic: once set it is never cleared.
#[derive(Debug)]
pub struct JobHandle {
    job_id: String,
    cancelled: AtomicBool,
    created_at: DateTime<Utc>,
}

impl JobHandle {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns true only for the call that flips the flag
    fn cancel(&self) -> bool {
        !self.cancelled.swap(true, Ordering::SeqCst)
    }
}

struct Entry {
    handle: Arc<JobHandle>,
    request: DownloadRequest,
    state: JobState,
}

/// Read-only view of an active job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveJob {
    pub job_id: String,
    pub target: String,
    pub format: FormatChoice,
    pub quality: Quality,
    pub state: JobState,
    pub created_at: DateTime<Utc>,
}

/// Table of in-flight jobs keyed by job id
///
/// An id is present while its job can still be cancelled.
/// Absence is the authoritative "not active" signal. Every operation holds
/// the lock only for a constant-time table access.
#[derive(Default)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<String, Entry>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        // A panic while holding the lock cannot leave an entry half-written
        self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a new job; fails if the id is already active
    pub fn register(&self, request: &DownloadRequest) -> Result<Arc<JobHandle>, RegistryError> {
        let mut jobs = self.table();
        if jobs.contains_key(&request.job_id) {
            return Err(RegistryError::DuplicateJob(request.job_id.clone()));
        }

        let handle = Arc::new(JobHandle {
            job_id: request.job_id.clone(),
            cancelled: AtomicBool::new(false),
            created_at: Utc::now(),
        });

        jobs.insert(
            request.job_id.clone(),
            Entry {
                handle: handle.clone(),
                request: request.clone(),
                state: JobState::Running,
            },
        );
        debug!(job_id = %request.job_id, active = jobs.len(), "Job registered");

        Ok(handle)
    }

    /// Request cooperative cancellation
    ///
    /// Returns true if the job is active and was not already cancelled.
    /// Does not wait for the job to stop.
    pub fn cancel(&self, job_id: &str) -> bool {
        let mut jobs = self.table();
        match jobs.get_mut(job_id) {
            Some(entry) if entry.handle.cancel() => {
                entry.state = JobState::Cancelling;
                true
            }
            _ => false,
        }
    }

    /// True if the job was cancelled or is no longer registered
    pub fn is_cancelled(&self, job_id: &str) -> bool {
        self.table()
            .get(job_id)
            .is_none_or(|entry| entry.handle.is_cancelled())
    }

    pub fn contains(&self, job_id: &str) -> bool {
        self.table().contains_key(job_id)
    }

    /// Record a lifecycle transition; a cancelling job keeps that state
    pub fn set_state(&self, job_id: &str, state: JobState) {
        if let Some(entry) = self.table().get_mut(job_id) {
            if !entry.handle.is_cancelled() {
                entry.state = state;
            }
        }
    }

    /// Deregister a job that has not been cancelled
    ///
    /// Check and removal happen under one lock, so a cancel either lands
    /// before this (returns false, entry kept) or finds nothing to cancel.
    pub fn finish_unless_cancelled(&self, job_id: &str) -> bool {
        let mut jobs = self.table();
        match jobs.get(job_id) {
            Some(entry) if !entry.handle.is_cancelled() => {
                jobs.remove(job_id);
                debug!(job_id, "Job deregistered");
                true
            }
            _ => false,
        }
    }

    /// Deregister a job; removing an unknown id is a no-op
    pub fn remove(&self, job_id: &str) {
        if self.table().remove(job_id).is_some() {
            debug!(job_id, "Job deregistered");
        }
    }

    pub fn len(&self) -> usize {
        self.table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of active jobs, oldest first
    pub fn snapshot(&self) -> Vec<ActiveJob> {
        let mut jobs: Vec<ActiveJob> = self
            .table()
            .values()
            .map(|entry| ActiveJob {
                job_id: entry.request.job_id.clone(),
                target: entry.request.target.clone(),
                format: entry.request.format,
                quality: entry.request.quality,
                state: entry.state,
                created_at: entry.handle.created_at,
            })
            .collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.job_id.cmp(&b.job_id)));
        jobs
    }
}
