//! Maps raw fetch failures to user-facing messages
//!
//! Classification is a case-insensitive substring search over an ordered
//! rule table. The first matching rule wins, so more specific keywords must
//! stay ahead of generic ones ("login" before "unavailable", "connection"
//! before "timeout").

use serde::Serialize;

/// Longest excerpt of the raw error kept for [`FailureKind::Unknown`]
pub const UNKNOWN_EXCERPT_CHARS: usize = 150;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "excerpt", rename_all = "snake_case")]
pub enum FailureKind {
    UserCancelled,
    AccessDenied,
    NotFound,
    RateLimited,
    PrivateContent,
    AuthRequired,
    CopyrightBlocked,
    Unavailable,
    NetworkError,
    Timeout,
    FormatUnavailable,
    ExternalToolMissing,
    Unknown(String),
}

const RULES: &[(&[&str], FailureKind)] = &[
    (&["cancelled", "canceled", "killed"], FailureKind::UserCancelled),
    (&["http error 403", "forbidden"], FailureKind::AccessDenied),
    (&["http error 404"], FailureKind::NotFound),
    (&["http error 429"], FailureKind::RateLimited),
    (&["private video"], FailureKind::PrivateContent),
    (&["sign in", "login"], FailureKind::AuthRequired),
    (&["copyright"], FailureKind::CopyrightBlocked),
    (&["unavailable"], FailureKind::Unavailable),
    (&["network", "connection"], FailureKind::NetworkError),
    (&["timeout"], FailureKind::Timeout),
    (&["format"], FailureKind::FormatUnavailable),
    (&["ffmpeg", "ffprobe"], FailureKind::ExternalToolMissing),
];

/// Classify a raw failure description
pub fn classify(raw: &str) -> FailureKind {
    let lower = raw.to_lowercase();

    for (keywords, kind) in RULES {
        if keywords.iter().any(|keyword| lower.contains(keyword)) {
            return kind.clone();
        }
    }

    FailureKind::Unknown(raw.chars().take(UNKNOWN_EXCERPT_CHARS).collect())
}

impl FailureKind {
    pub fn is_cancellation(&self) -> bool {
        matches!(self, FailureKind::UserCancelled)
    }

    /// The fixed sentence shown to users for this kind
    pub fn user_message(&self) -> String {
        let message = match self {
            FailureKind::UserCancelled => "Download cancelled by user",
            FailureKind::AccessDenied => {
                "Access denied. The video might be private, region-blocked, or require authentication. Try adding credentials in Settings."
            }
            FailureKind::NotFound => {
                "Video not found. The URL might be incorrect or the video was removed."
            }
            FailureKind::RateLimited => {
                "Too many requests. The website is rate-limiting. Please wait a few minutes and try again."
            }
            FailureKind::PrivateContent => {
                "This is a private video. You need proper access permissions to download it."
            }
            FailureKind::AuthRequired => {
                "This video requires login. Please add your credentials in Settings."
            }
            FailureKind::CopyrightBlocked => {
                "This video is copyright protected and cannot be downloaded."
            }
            FailureKind::Unavailable => {
                "Video unavailable. It might be deleted, private, or not available in your region."
            }
            FailureKind::NetworkError => {
                "Network error. Check your internet connection and try again."
            }
            FailureKind::Timeout => {
                "Connection timeout. The server took too long to respond. Try again later."
            }
            FailureKind::FormatUnavailable => {
                "Requested format not available. Try selecting a different quality."
            }
            FailureKind::ExternalToolMissing => {
                "FFmpeg is not installed or not found in PATH. Please install FFmpeg to merge video and audio."
            }
            FailureKind::Unknown(excerpt) => return format!("Download failed: {}", excerpt),
        };

        message.to_string()
    }
}

/// Shortcut for `classify(raw).user_message()`
pub fn user_message(raw: &str) -> String {
    classify(raw).user_message()
}
