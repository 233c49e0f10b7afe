//! [`MediaFetcher`] backed by the `yt-dlp` executable
//!
//! Progress is read line by line from the child's output through a custom
//! `--progress-template`; the final info dict is printed as JSON after the
//! file is moved into place. The child is killed when the progress hook
//! aborts, and `kill_on_drop` covers every other early exit.

use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::formats::{RawFormat, build_format_list};
use super::{FetchError, FetchProgress, FetchRequest, FetchedMedia, MediaFetcher, MediaInfo, ProgressHook};
use crate::humanize::ByteSize;
use crate::jobs::{FormatChoice, Quality};
use crate::store::Credentials;

const PROGRESS_PREFIX: &str = "[progress]";
const PROGRESS_TEMPLATE: &str = "download:[progress] %(progress.downloaded_bytes)s|%(progress.total_bytes)s|%(progress.total_bytes_estimate)s|%(progress.speed)s|%(progress.eta)s|%(progress.status)s";
const MAX_DESCRIPTION_CHARS: usize = 300;
const MAX_STDERR_LINES: usize = 5;

/// Tuning knobs passed to every yt-dlp invocation
#[derive(Debug, Clone)]
pub struct YtDlpOptions {
    pub binary: PathBuf,
    pub socket_timeout_secs: u64,
    pub concurrent_fragments: u32,
    pub http_chunk_size: ByteSize,
    pub fragment_retries: u32,
}

impl Default for YtDlpOptions {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("yt-dlp"),
            socket_timeout_secs: 30,
            concurrent_fragments: 8,
            http_chunk_size: ByteSize(10 * 1024 * 1024),
            fragment_retries: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct YtDlpFetcher {
    options: YtDlpOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

impl YtDlpFetcher {
    pub fn new(options: YtDlpOptions) -> Self {
        Self { options }
    }

    fn tool_name(&self) -> String {
        self.options.binary.display().to_string()
    }

    fn command(&self, args: &[String]) -> Command {
        let mut command = Command::new(&self.options.binary);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    fn probe_args(&self, target: &str, credentials: &Credentials) -> Vec<String> {
        let mut args = vec![
            "--dump-json".to_string(),
            "--no-warnings".to_string(),
            "--no-playlist".to_string(),
            "--socket-timeout".to_string(),
            self.options.socket_timeout_secs.to_string(),
        ];
        push_credentials(&mut args, credentials);
        args.push(target.to_string());
        args
    }

    fn download_args(&self, request: &FetchRequest) -> Vec<String> {
        let output = request.output_dir.join("%(title)s.%(ext)s");

        let mut args = vec![
            "-f".to_string(),
            format_selector(request.format, request.quality),
            "-o".to_string(),
            output.to_string_lossy().to_string(),
        ];

        match request.format {
            FormatChoice::Video => {
                args.extend(["--merge-output-format".to_string(), "mp4".to_string()]);
            }
            FormatChoice::Audio => {
                args.extend([
                    "-x".to_string(),
                    "--audio-format".to_string(),
                    "mp3".to_string(),
                    "--audio-quality".to_string(),
                    "192K".to_string(),
                ]);
            }
        }

        args.extend([
            "--concurrent-fragments".to_string(),
            self.options.concurrent_fragments.to_string(),
            "--http-chunk-size".to_string(),
            self.options.http_chunk_size.as_u64().to_string(),
            "--retries".to_string(),
            "10".to_string(),
            "--fragment-retries".to_string(),
            self.options.fragment_retries.to_string(),
            "--socket-timeout".to_string(),
            self.options.socket_timeout_secs.to_string(),
            "--postprocessor-args".to_string(),
            "ffmpeg:-threads 4".to_string(),
            "--no-warnings".to_string(),
            "--no-playlist".to_string(),
            "--newline".to_string(),
            "--progress".to_string(),
            "--progress-template".to_string(),
            PROGRESS_TEMPLATE.to_string(),
            "--print".to_string(),
            "after_move:%()j".to_string(),
        ]);

        push_credentials(&mut args, &request.credentials);
        args.push(request.target.clone());
        args
    }
}

#[async_trait]
impl MediaFetcher for YtDlpFetcher {
    async fn probe(&self, target: &str, credentials: &Credentials) -> Result<MediaInfo, FetchError> {
        let output = self
            .command(&self.probe_args(target, credentials))
            .output()
            .await
            .map_err(|source| FetchError::Launch {
                tool: self.tool_name(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let lines: Vec<String> = stderr.lines().map(str::to_string).collect();
            return Err(FetchError::Failed(error_text(&lines, output.status)));
        }

        let info: Value = serde_json::from_slice(&output.stdout)?;
        Ok(media_info_from_json(target, &info))
    }

    async fn fetch(
        &self,
        request: FetchRequest,
        progress: ProgressHook,
    ) -> Result<FetchedMedia, FetchError> {
        tokio::fs::create_dir_all(&request.output_dir).await?;

        let args = self.download_args(&request);
        debug!(url = %request.target, ?args, "Launching yt-dlp");

        let mut child = self.command(&args).spawn().map_err(|source| FetchError::Launch {
            tool: self.tool_name(),
            source,
        })?;

        let (tx, mut rx) = mpsc::channel::<(Stream, String)>(256);
        if let Some(stdout) = child.stdout.take() {
            spawn_line_reader(stdout, Stream::Stdout, tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_line_reader(stderr, Stream::Stderr, tx.clone());
        }
        drop(tx);

        let mut info: Option<Value> = None;
        let mut stderr_lines: Vec<String> = Vec::new();

        while let Some((stream, line)) = rx.recv().await {
            if let Some(update) = parse_progress_line(&line) {
                if progress(update).is_err() {
                    debug!(url = %request.target, "Progress hook aborted fetch");
                    if let Err(e) = child.kill().await {
                        warn!(error = %e, "Failed to kill yt-dlp");
                    }
                    return Err(FetchError::Aborted);
                }
                continue;
            }

            match stream {
                Stream::Stdout if line.trim_start().starts_with('{') => {
                    match serde_json::from_str::<Value>(line.trim()) {
                        Ok(value) => info = Some(value),
                        Err(e) => warn!(error = %e, "Unparsable info line from yt-dlp"),
                    }
                }
                Stream::Stderr if !line.trim().is_empty() => stderr_lines.push(line),
                _ => {}
            }
        }

        let status = child.wait().await?;
        if !status.success() {
            return Err(FetchError::Failed(error_text(&stderr_lines, status)));
        }

        let info = info.ok_or_else(|| {
            FetchError::Failed("yt-dlp finished without reporting metadata".to_string())
        })?;
        Ok(fetched_from_json(&request.target, &info))
    }
}

fn spawn_line_reader<R>(reader: R, stream: Stream, tx: mpsc::Sender<(Stream, String)>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send((stream, line)).await.is_err() {
                break;
            }
        }
    });
}

fn push_credentials(args: &mut Vec<String>, credentials: &Credentials) {
    if let Some((username, password)) = credentials.login() {
        args.extend([
            "--username".to_string(),
            username.to_string(),
            "--password".to_string(),
            password.to_string(),
        ]);
    }
}

pub(crate) fn format_selector(format: FormatChoice, quality: Quality) -> String {
    match (format, quality.max_height()) {
        (FormatChoice::Audio, _) => "bestaudio/best".to_string(),
        (FormatChoice::Video, Some(height)) => format!(
            "bestvideo[height<={h}][ext=mp4]+bestaudio[ext=m4a]/best[height<={h}]",
            h = height
        ),
        (FormatChoice::Video, None) => "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best".to_string(),
    }
}

fn parse_number(field: &str) -> Option<f64> {
    let field = field.trim();
    if field.is_empty() || field.eq_ignore_ascii_case("na") || field.eq_ignore_ascii_case("none") {
        return None;
    }
    field.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0)
}

/// Parse a line produced by [`PROGRESS_TEMPLATE`]
pub(crate) fn parse_progress_line(line: &str) -> Option<FetchProgress> {
    let rest = line.trim_start_matches('\r').trim().strip_prefix(PROGRESS_PREFIX)?;
    let fields: Vec<&str> = rest.trim().split('|').collect();
    if fields.len() != 6 {
        return None;
    }

    if fields[5].trim() == "finished" {
        return Some(FetchProgress::Finished);
    }

    Some(FetchProgress::Downloading {
        downloaded: parse_number(fields[0]).map(|v| v as u64).unwrap_or(0),
        total: parse_number(fields[1]).map(|v| v as u64),
        total_estimate: parse_number(fields[2]).map(|v| v as u64),
        speed: parse_number(fields[3]),
        eta: parse_number(fields[4]).map(|v| v as u64),
    })
}

fn error_text(stderr_lines: &[String], status: ExitStatus) -> String {
    let errors: Vec<&str> = stderr_lines
        .iter()
        .map(|line| line.trim())
        .filter(|line| line.starts_with("ERROR:"))
        .collect();
    if !errors.is_empty() {
        return errors.join("\n");
    }

    let tail: Vec<&str> = stderr_lines
        .iter()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .rev()
        .take(MAX_STDERR_LINES)
        .collect();
    if !tail.is_empty() {
        return tail.into_iter().rev().collect::<Vec<_>>().join("\n");
    }

    format!("yt-dlp exited with {}", status)
}

fn str_field(info: &Value, key: &str) -> Option<String> {
    info.get(key).and_then(Value::as_str).map(str::to_string)
}

fn f64_field(info: &Value, key: &str) -> f64 {
    info.get(key).and_then(Value::as_f64).unwrap_or(0.0)
}

fn u64_field(info: &Value, key: &str) -> Option<u64> {
    info.get(key).and_then(Value::as_u64)
}

pub(crate) fn fetched_from_json(target: &str, info: &Value) -> FetchedMedia {
    FetchedMedia {
        title: str_field(info, "title").unwrap_or_else(|| "Unknown".to_string()),
        source_url: str_field(info, "webpage_url").unwrap_or_else(|| target.to_string()),
        thumbnail_url: str_field(info, "thumbnail").filter(|url| !url.is_empty()),
        duration_seconds: f64_field(info, "duration"),
        filesize_bytes: u64_field(info, "filesize")
            .filter(|size| *size > 0)
            .or_else(|| u64_field(info, "filesize_approx"))
            .unwrap_or(0),
    }
}

pub(crate) fn media_info_from_json(target: &str, info: &Value) -> MediaInfo {
    let raw_formats: Vec<RawFormat> = info
        .get("formats")
        .and_then(Value::as_array)
        .map(|formats| {
            formats
                .iter()
                .filter_map(|f| serde_json::from_value(f.clone()).ok())
                .collect()
        })
        .unwrap_or_default();

    MediaInfo {
        title: str_field(info, "title").unwrap_or_else(|| "Unknown".to_string()),
        thumbnail: str_field(info, "thumbnail").unwrap_or_default(),
        duration: f64_field(info, "duration"),
        uploader: str_field(info, "uploader").unwrap_or_else(|| "Unknown".to_string()),
        description: str_field(info, "description")
            .unwrap_or_default()
            .chars()
            .take(MAX_DESCRIPTION_CHARS)
            .collect(),
        formats: build_format_list(&raw_formats),
        url: target.to_string(),
        video_id: str_field(info, "id").unwrap_or_else(|| "unknown".to_string()),
        view_count: u64_field(info, "view_count").unwrap_or(0),
        upload_date: str_field(info, "upload_date").unwrap_or_default(),
    }
}
