use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// What kind of output a job produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatChoice {
    Video,
    Audio,
}

impl fmt::Display for FormatChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatChoice::Video => f.write_str("video"),
            FormatChoice::Audio => f.write_str("audio"),
        }
    }
}

/// Maximum vertical resolution, or the best-available sentinel
///
/// Serialized as an integer (`1080`) or the string `"best"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quality {
    #[default]
    Best,
    MaxHeight(u32),
}

impl Quality {
    pub fn max_height(&self) -> Option<u32> {
        match self {
            Quality::Best => None,
            Quality::MaxHeight(height) => Some(*height),
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quality::Best => f.write_str("best"),
            Quality::MaxHeight(height) => write!(f, "{}p", height),
        }
    }
}

impl Serialize for Quality {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Quality::Best => serializer.serialize_str("best"),
            Quality::MaxHeight(height) => serializer.serialize_u32(*height),
        }
    }
}

impl<'de> Deserialize<'de> for Quality {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Height(u32),
            Label(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Height(0) => Ok(Quality::Best),
            Repr::Height(height) => Ok(Quality::MaxHeight(height)),
            Repr::Label(label) => label.parse().map_err(serde::de::Error::custom),
        }
    }
}

impl FromStr for Quality {
    type Err = String;

    /// Accepts `best`, `1080` or `1080p`; zero means best
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = s.trim().to_lowercase();
        if label == "best" || label.is_empty() {
            return Ok(Quality::Best);
        }

        match label.trim_end_matches('p').parse::<u32>() {
            Ok(0) => Ok(Quality::Best),
            Ok(height) => Ok(Quality::MaxHeight(height)),
            Err(_) => Err(format!("invalid quality: {label}")),
        }
    }
}

/// Lifecycle state of an active job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Running,
    Retrying,
    Cancelling,
    Completed,
    Cancelled,
    Failed,
}

/// A caller's request to fetch one target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRequest {
    pub job_id: String,
    pub target: String,
    pub format: FormatChoice,
    pub quality: Quality,
}

impl DownloadRequest {
    /// Label stored with history records, e.g. `1080p video` or `best audio`
    pub fn format_label(&self) -> String {
        match self.quality {
            Quality::Best => format!("best {}", self.format),
            Quality::MaxHeight(height) => format!("{}p {}", height, self.format),
        }
    }
}

/// Retry policy captured once when a job starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            max_retries: max_retries.max(1),
            retry_delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(3))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Wrapper {
        quality: Quality,
    }

    fn parse(json: &str) -> Quality {
        serde_json::from_str::<Wrapper>(json).unwrap().quality
    }

    #[test]
    fn test_quality_accepts_numbers_and_labels() {
        assert_eq!(parse(r#"{"quality": 1080}"#), Quality::MaxHeight(1080));
        assert_eq!(parse(r#"{"quality": "720p"}"#), Quality::MaxHeight(720));
        assert_eq!(parse(r#"{"quality": "720"}"#), Quality::MaxHeight(720));
        assert_eq!(parse(r#"{"quality": "best"}"#), Quality::Best);
        assert_eq!(parse(r#"{"quality": 0}"#), Quality::Best);
    }

    #[test]
    fn test_quality_rejects_garbage() {
        assert!(serde_json::from_str::<Wrapper>(r#"{"quality": "ultra"}"#).is_err());
    }

    #[test]
    fn test_quality_serializes_back() {
        assert_eq!(serde_json::to_string(&Quality::MaxHeight(480)).unwrap(), "480");
        assert_eq!(serde_json::to_string(&Quality::Best).unwrap(), "\"best\"");
    }

    #[test]
    fn test_format_label() {
        let mut request = DownloadRequest {
            job_id: "a".to_string(),
            target: "https://example.com/v".to_string(),
            format: FormatChoice::Video,
            quality: Quality::MaxHeight(1080),
        };
        assert_eq!(request.format_label(), "1080p video");

        request.format = FormatChoice::Audio;
        request.quality = Quality::Best;
        assert_eq!(request.format_label(), "best audio");
    }

    #[test]
    fn test_retry_policy_never_below_one_attempt() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_retries, 1);
        assert_eq!(RetryPolicy::default().max_retries, 5);
    }
}
