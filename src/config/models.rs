use crate::fetcher::YtDlpOptions;
use crate::humanize::ByteSize;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

/// Top-level service configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub events: EventsConfig,
}

impl Config {
    /// User settings file
    pub fn settings_path(&self) -> PathBuf {
        self.server.data_dir.join("config.json")
    }

    /// Download history file
    pub fn history_path(&self) -> PathBuf {
        self.server.data_dir.join("history.json")
    }

    pub fn thumbnails_dir(&self) -> PathBuf {
        self.server.data_dir.join("thumbnails")
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    /// Holds the settings file, the history file and the thumbnail cache
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: ByteSize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            data_dir: default_data_dir(),
            max_payload_bytes: default_max_payload_bytes(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, 8080))
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_max_payload_bytes() -> ByteSize {
    ByteSize(64 * 1024)
}

/// Knobs for the yt-dlp process
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetcherConfig {
    #[serde(default = "default_ytdlp_path")]
    pub ytdlp_path: PathBuf,
    #[serde(default = "default_socket_timeout_secs")]
    pub socket_timeout_secs: u64,
    #[serde(default = "default_concurrent_fragments")]
    pub concurrent_fragments: u32,
    #[serde(default = "default_http_chunk_size")]
    pub http_chunk_size: ByteSize,
    #[serde(default = "default_fragment_retries")]
    pub fragment_retries: u32,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: default_ytdlp_path(),
            socket_timeout_secs: default_socket_timeout_secs(),
            concurrent_fragments: default_concurrent_fragments(),
            http_chunk_size: default_http_chunk_size(),
            fragment_retries: default_fragment_retries(),
        }
    }
}

impl FetcherConfig {
    pub fn ytdlp_options(&self) -> YtDlpOptions {
        YtDlpOptions {
            binary: self.ytdlp_path.clone(),
            socket_timeout_secs: self.socket_timeout_secs,
            concurrent_fragments: self.concurrent_fragments,
            http_chunk_size: self.http_chunk_size,
            fragment_retries: self.fragment_retries,
        }
    }
}

fn default_ytdlp_path() -> PathBuf {
    PathBuf::from("yt-dlp")
}

fn default_socket_timeout_secs() -> u64 {
    30
}

fn default_concurrent_fragments() -> u32 {
    8
}

fn default_http_chunk_size() -> ByteSize {
    ByteSize(10 * 1024 * 1024)
}

fn default_fragment_retries() -> u32 {
    10
}

/// Progress event fan-out
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventsConfig {
    /// Events buffered per subscriber before a slow one starts lagging
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

fn default_channel_capacity() -> usize {
    1024
}
