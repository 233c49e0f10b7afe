use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{Result, read_json_or_default, write_json};

/// Most records kept; older entries are evicted
pub const HISTORY_LIMIT: usize = 100;

/// A completed download
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub title: String,
    #[serde(rename = "url")]
    pub source_url: String,
    /// Local thumbnail path when cached, otherwise the remote URL
    #[serde(rename = "thumbnail", default)]
    pub thumbnail_path: String,
    #[serde(rename = "duration", default)]
    pub duration_seconds: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "format")]
    pub format_label: String,
    #[serde(rename = "filesize", default)]
    pub filesize_bytes: u64,
}

pub trait HistoryStore: Send + Sync {
    /// Records, most recent first; empty on any read or parse failure
    fn load(&self) -> Vec<HistoryRecord>;

    fn save(&self, records: &[HistoryRecord]) -> Result<()>;

    /// Prepend a record and evict past [`HISTORY_LIMIT`]
    fn push(&self, record: HistoryRecord) -> Result<()>;

    fn clear(&self) -> Result<()> {
        self.save(&[])
    }
}

/// History kept in a single JSON file
///
/// `push` is a read-modify-write; the lock serializes concurrent completions.
#[derive(Debug)]
pub struct JsonHistoryStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistoryStore for JsonHistoryStore {
    fn load(&self) -> Vec<HistoryRecord> {
        read_json_or_default(&self.path, "history")
    }

    fn save(&self, records: &[HistoryRecord]) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
        write_json(&self.path, &records[..records.len().min(HISTORY_LIMIT)])
    }

    fn push(&self, record: HistoryRecord) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());

        let mut records = self.load();
        records.insert(0, record);
        records.truncate(HISTORY_LIMIT);
        write_json(&self.path, &records)
    }
}
