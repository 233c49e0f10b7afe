use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{Result, read_json_or_default, write_json};
use crate::jobs::RetryPolicy;

/// Site login passed through to the fetcher
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Credentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl Credentials {
    /// Username and password, when a non-empty username is set
    pub fn login(&self) -> Option<(&str, &str)> {
        let username = self.username.as_deref().filter(|u| !u.is_empty())?;
        Some((username, self.password.as_deref().unwrap_or("")))
    }
}

/// User-editable settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub credentials: Credentials,
    #[serde(default = "default_download_path")]
    pub download_path: PathBuf,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Seconds between attempts
    #[serde(default = "default_retry_delay")]
    pub retry_delay: u64,
}

impl Settings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_secs(self.retry_delay))
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            credentials: Credentials::default(),
            download_path: default_download_path(),
            max_retries: default_max_retries(),
            retry_delay: default_retry_delay(),
        }
    }
}

fn default_download_path() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_max_retries() -> u32 {
    5
}

fn default_retry_delay() -> u64 {
    3
}

pub trait SettingsStore: Send + Sync {
    /// Current settings; defaults on any read or parse failure
    fn load(&self) -> Settings;

    fn save(&self, settings: &Settings) -> Result<()>;
}

/// Settings kept in a single JSON file
#[derive(Debug, Clone)]
pub struct JsonSettingsStore {
    path: PathBuf,
}

impl JsonSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for JsonSettingsStore {
    fn load(&self) -> Settings {
        read_json_or_default(&self.path, "settings")
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        write_json(&self.path, settings)?;
        tracing::debug!(path = %self.path.display(), "Settings saved");
        Ok(())
    }
}
