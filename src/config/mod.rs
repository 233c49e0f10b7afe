//! Service configuration for clipfetch
//!
//! Settings are layered, lowest priority first:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables
//!
//! # Usage
//!
//! ```no_run
//! use clipfetch::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Server listening on: {}", config.server.bind_addr);
//! ```
//!
//! # Environment Variables
//!
//! Any key can be overridden with `CLIPFETCH__<section>__<key>`:
//! - `CLIPFETCH__SERVER__BIND_ADDR=0.0.0.0:9000`
//! - `CLIPFETCH__SERVER__DATA_DIR=/var/lib/clipfetch`
//! - `CLIPFETCH__FETCHER__YTDLP_PATH=/opt/yt-dlp`
//!
//! # Configuration File
//!
//! Read from `config/clipfetch.toml` unless `CLIPFETCH_CONFIG` points elsewhere.
//! User-editable settings (download folder, retries, credentials) live
//! separately in `<data_dir>/config.json`; see [`crate::store`].

mod models;
mod sources;
mod validation;

pub use crate::humanize::ByteSize;
pub use models::{Config, EventsConfig, FetcherConfig, ServerConfig};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// # Errors
    ///
    /// Returns an error if the file is malformed or a value fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}
