//! Progress events and the sinks that carry them to listeners

use bon::Builder;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    Downloading,
    Processing,
    Retrying,
    Cancelling,
    Cancelled,
    Completed,
    Error,
}

impl ProgressStatus {
    /// Whether this status ends the job's lifecycle
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressStatus::Completed | ProgressStatus::Cancelled | ProgressStatus::Error
        )
    }
}

/// One structured progress update for a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
pub struct ProgressEvent {
    #[builder(into)]
    pub job_id: String,
    pub status: ProgressStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent: Option<f64>,
    #[builder(into)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[builder(into)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technical_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downloaded: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    /// Bytes per second
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    /// Seconds remaining
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta: Option<u64>,
}

impl ProgressEvent {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Fire-and-forget destination for progress events
///
/// Implementations must never fail the caller: a listener that went away is
/// not an error for the job that produced the event.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

/// Broadcast fan-out of progress events to any number of subscribers
///
/// Events for one job are delivered in emission order. Subscribers that fall
/// more than `capacity` events behind lose the oldest ones.
#[derive(Debug, Clone)]
pub struct ProgressChannel {
    sender: broadcast::Sender<ProgressEvent>,
}

impl ProgressChannel {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ProgressChannel {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl ProgressSink for ProgressChannel {
    fn emit(&self, event: ProgressEvent) {
        if let Err(err) = self.sender.send(event) {
            trace!(job_id = %err.0.job_id, "No progress listeners, event dropped");
        }
    }
}
