//! Download job orchestration
//!
//! Jobs are registered in a [`JobRegistry`], executed by the
//! [`JobOrchestrator`] on their own Tokio task, and report through a
//! [`ProgressSink`]. Cancellation is cooperative: a per-job flag is polled
//! before every attempt and on every progress callback from the fetcher.
//!
//! ## Example
//!
//! ```rust,ignore
//! use clipfetch::jobs::{DownloadRequest, FormatChoice, JobOrchestrator, Quality};
//!
//! let orchestrator = JobOrchestrator::builder()
//!     .registry(registry)
//!     .fetcher(fetcher)
//!     .settings(settings)
//!     .history(history)
//!     .progress(progress)
//!     .build();
//!
//! orchestrator.start_download(DownloadRequest {
//!     job_id: "job-1".into(),
//!     target: "https://example.com/watch?v=abc".into(),
//!     format: FormatChoice::Video,
//!     quality: Quality::MaxHeight(1080),
//! })?;
//! orchestrator.cancel_download("job-1")?;
//! ```

pub mod classify;
mod orchestrator;
mod progress;
mod registry;
mod types;

pub use classify::{FailureKind, classify};
pub use orchestrator::{JobOrchestrator, OrchestratorError};
pub use progress::{ProgressChannel, ProgressEvent, ProgressSink, ProgressStatus};
pub use registry::{ActiveJob, JobHandle, JobRegistry, RegistryError};
pub use types::{DownloadRequest, FormatChoice, JobState, Quality, RetryPolicy};
