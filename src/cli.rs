use clap::{Parser, Subcommand};
use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use clipfetch::api::AppState;
use clipfetch::humanize::{self, ByteSize};
use clipfetch::jobs::{DownloadRequest, FormatChoice, ProgressEvent, ProgressStatus, Quality};

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Parser, Debug)]
#[command(name = "clipfetch")]
#[command(about = "Video and audio download service", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP API
    Serve(ServeArgs),
    /// Show metadata and the available formats for a URL
    Info(InfoArgs),
    /// Download one URL in the foreground; Ctrl+C cancels
    Download(DownloadArgs),
    /// Print the resolved service configuration as TOML
    Config,
}

#[derive(clap::Args, Debug)]
pub struct ServeArgs {
    /// Address to bind the HTTP server to (overrides the config file)
    #[arg(long)]
    pub address: Option<SocketAddr>,

    /// Directory for settings, history and thumbnails
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct InfoArgs {
    pub url: String,
}

#[derive(clap::Args, Debug)]
pub struct DownloadArgs {
    pub url: String,

    /// Extract audio as MP3 instead of downloading video
    #[arg(long)]
    pub audio: bool,

    /// Maximum height such as 1080, or "best"
    #[arg(long, default_value = "best")]
    pub quality: Quality,
}

pub async fn info(state: AppState, args: InfoArgs) -> Result<(), AnyError> {
    let info = state.orchestrator.probe(&args.url).await?;

    println!("{}", info.title);
    println!("  uploader: {}", info.uploader);
    println!("  duration: {}", humanize::eta(info.duration.max(0.0) as u64));
    if !info.upload_date.is_empty() {
        println!("  uploaded: {}", info.upload_date);
    }
    println!("  views:    {}", info.view_count);
    println!();

    if info.formats.is_empty() {
        println!("No formats at 720p or above");
    }
    for format in &info.formats {
        println!(
            "  {:>6}  {:<4}  {:>9}  {:>3.0}fps  {} + {}  [{}]",
            format.resolution,
            format.ext,
            ByteSize(format.filesize).to_string(),
            format.fps,
            format.vcodec,
            format.acodec,
            format.format_id,
        );
    }

    Ok(())
}

/// Run a single job to its terminal event; returns whether it completed
pub async fn download(state: AppState, args: DownloadArgs) -> Result<bool, AnyError> {
    let mut events = state.progress.subscribe();

    let format = if args.audio {
        FormatChoice::Audio
    } else {
        FormatChoice::Video
    };
    let job_id = state.orchestrator.start_download(DownloadRequest {
        job_id: Uuid::now_v7().to_string(),
        target: args.url,
        format,
        quality: args.quality,
    })?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut cancel_requested = false;

    loop {
        tokio::select! {
            _ = &mut ctrl_c, if !cancel_requested => {
                cancel_requested = true;
                if let Err(e) = state.orchestrator.cancel_download(&job_id) {
                    tracing::warn!(job_id = %job_id, error = %e, "Cancel request ignored");
                }
            }
            received = events.recv() => match received {
                Ok(event) if event.job_id == job_id => {
                    print_event(&event);
                    if event.is_terminal() {
                        return Ok(event.status == ProgressStatus::Completed);
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Progress output lagged");
                }
                Err(RecvError::Closed) => return Err("progress channel closed".into()),
            }
        }
    }
}

fn print_event(event: &ProgressEvent) {
    let message = event.message.as_deref().unwrap_or_default();

    match event.status {
        ProgressStatus::Downloading => {
            let percent = event.percent.unwrap_or(0.0);
            print!(
                "\r{:5.1}%  {} / {}  {}  ETA {}    ",
                percent,
                ByteSize(event.downloaded.unwrap_or(0)),
                ByteSize(event.total.unwrap_or(0)),
                humanize::rate(event.speed.unwrap_or(0.0)),
                humanize::eta(event.eta.unwrap_or(0)),
            );
            let _ = std::io::stdout().flush();
        }
        ProgressStatus::Error => {
            println!();
            eprintln!("{}", message);
            if let Some(raw) = &event.technical_error {
                eprintln!("  {}", raw);
            }
        }
        _ => {
            println!();
            println!("{}", message);
        }
    }
}
