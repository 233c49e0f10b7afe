//! Download job orchestration around an external media fetcher
//!
//! [`jobs`] holds the core: registry, retrying orchestrator, progress
//! channel and error classification. [`fetcher`] drives yt-dlp, [`store`]
//! persists settings and history, and [`api`] exposes everything over HTTP.

pub mod api;
pub mod config;
pub mod fetcher;
pub mod humanize;
pub mod jobs;
pub mod observability;
pub mod picker;
pub mod store;
