use bytes::Bytes;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

const MAX_TITLE_CHARS: usize = 100;

/// Remove characters that are invalid in file names on common platforms
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
        .collect()
}

/// Saves one thumbnail per title under a fixed directory
///
/// Failures are logged and reported as `None`; a missing thumbnail never
/// fails a download.
#[derive(Debug, Clone)]
pub struct ThumbnailCache {
    client: Client,
    dir: PathBuf,
}

impl ThumbnailCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            client,
            dir: dir.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path a thumbnail for `title` is stored at
    pub fn path_for(&self, title: &str) -> PathBuf {
        let safe: String = sanitize_filename(title).chars().take(MAX_TITLE_CHARS).collect();
        self.dir.join(format!("{}.jpg", safe))
    }

    /// Download the thumbnail unless one for this title already exists
    pub async fn fetch(&self, url: &str, title: &str) -> Option<PathBuf> {
        if url.is_empty() {
            return None;
        }

        let path = self.path_for(title);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            debug!(path = %path.display(), "Thumbnail already cached");
            return Some(path);
        }

        match self.download(url).await {
            Ok(bytes) => match self.write(&path, bytes).await {
                Ok(()) => Some(path),
                Err(e) => {
                    warn!(url, error = %e, "Failed to save thumbnail");
                    None
                }
            },
            Err(e) => {
                warn!(url, error = %e, "Thumbnail download failed");
                None
            }
        }
    }

    async fn download(&self, url: &str) -> reqwest::Result<Bytes> {
        self.client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await
    }

    async fn write(&self, path: &Path, bytes: Bytes) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(path, &bytes).await
    }
}
