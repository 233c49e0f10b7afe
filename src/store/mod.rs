//! Flat-file persistence for user settings and download history
//!
//! Both stores are plain JSON documents without schema versioning. Readers
//! fail soft: a missing, unreadable or unparsable file yields defaults and a
//! log line, never an error.

mod history;
mod settings;

pub use history::{HISTORY_LIMIT, HistoryRecord, HistoryStore, JsonHistoryStore};
pub use settings::{Credentials, JsonSettingsStore, Settings, SettingsStore};

use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Write pretty JSON through a sibling temp file so readers never see a torn document
fn write_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let body = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, body)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Read a JSON document, falling back to `T::default()` on any failure
fn read_json_or_default<T>(path: &Path, what: &str) -> T
where
    T: serde::de::DeserializeOwned + Default,
{
    let body = match std::fs::read(path) {
        Ok(body) => body,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return T::default(),
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Failed loading {}", what);
            return T::default();
        }
    };

    match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Failed parsing {}", what);
            T::default()
        }
    }
}
