//! Format negotiation for probe results
//!
//! Combined (video+audio) streams at 720p and above are preferred, one per
//! resolution bucket. When a site only offers separate streams, entries are
//! synthesized from the best video stream per bucket with the size of the
//! largest standalone audio stream added on.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lowest resolution offered to users
pub const MIN_HEIGHT: u32 = 720;

/// One format entry as reported by the extractor
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawFormat {
    pub format_id: String,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub ext: Option<String>,
    #[serde(default)]
    pub filesize: Option<u64>,
    #[serde(default)]
    pub filesize_approx: Option<u64>,
    #[serde(default)]
    pub fps: Option<f64>,
    #[serde(default)]
    pub vcodec: Option<String>,
    #[serde(default)]
    pub acodec: Option<String>,
}

impl RawFormat {
    fn has_video(&self) -> bool {
        self.vcodec.as_deref() != Some("none")
    }

    fn has_audio(&self) -> bool {
        self.acodec.as_deref() != Some("none")
    }

    fn size(&self) -> u64 {
        self.filesize.or(self.filesize_approx).unwrap_or(0)
    }

    fn height(&self) -> u32 {
        self.height.unwrap_or(0)
    }

    fn to_option(&self, acodec: Option<&str>) -> FormatOption {
        FormatOption {
            format_id: self.format_id.clone(),
            resolution: format!("{}p", self.height()),
            ext: self.ext.clone().unwrap_or_else(|| "mp4".to_string()),
            filesize: self.size(),
            fps: self.fps.unwrap_or(30.0),
            vcodec: self.vcodec.clone().unwrap_or_else(|| "unknown".to_string()),
            acodec: acodec
                .map(str::to_string)
                .or_else(|| self.acodec.clone())
                .unwrap_or_else(|| "unknown".to_string()),
        }
    }
}

/// A user-selectable format
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormatOption {
    pub format_id: String,
    pub resolution: String,
    pub ext: String,
    pub filesize: u64,
    pub fps: f64,
    pub vcodec: String,
    pub acodec: String,
}

/// Build the format list, ordered by ascending resolution
pub fn build_format_list(formats: &[RawFormat]) -> Vec<FormatOption> {
    let mut buckets: BTreeMap<u32, FormatOption> = BTreeMap::new();

    for format in formats {
        if format.has_video() && format.has_audio() && format.height() >= MIN_HEIGHT {
            buckets
                .entry(format.height())
                .or_insert_with(|| format.to_option(None));
        }
    }

    if buckets.is_empty() {
        let mut audio_size = 0;

        for format in formats {
            if format.has_video() && format.height() >= MIN_HEIGHT {
                buckets
                    .entry(format.height())
                    .or_insert_with(|| format.to_option(Some("merged")));
            } else if format.has_audio() && !format.has_video() {
                audio_size = audio_size.max(format.size());
            }
        }

        for option in buckets.values_mut() {
            option.filesize += audio_size;
        }
    }

    buckets.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn combined(id: &str, height: u32, size: u64) -> RawFormat {
        RawFormat {
            format_id: id.to_string(),
            height: Some(height),
            ext: Some("mp4".to_string()),
            filesize: Some(size),
            vcodec: Some("avc1".to_string()),
            acodec: Some("mp4a".to_string()),
            ..Default::default()
        }
    }

    fn video_only(id: &str, height: u32, size: u64) -> RawFormat {
        RawFormat {
            acodec: Some("none".to_string()),
            ..combined(id, height, size)
        }
    }

    fn audio_only(id: &str, size: u64) -> RawFormat {
        RawFormat {
            format_id: id.to_string(),
            ext: Some("m4a".to_string()),
            filesize_approx: Some(size),
            vcodec: Some("none".to_string()),
            acodec: Some("mp4a".to_string()),
            ..Default::default()
        }
    }

    fn resolutions(list: &[FormatOption]) -> Vec<&str> {
        list.iter().map(|f| f.resolution.as_str()).collect()
    }

    #[test]
    fn test_sorted_by_ascending_resolution() {
        let list = build_format_list(&[
            combined("a", 1080, 10),
            combined("b", 720, 5),
            combined("c", 1440, 20),
        ]);
        assert_eq!(resolutions(&list), vec!["720p", "1080p", "1440p"]);
    }

    #[test]
    fn test_first_combined_stream_per_bucket_wins() {
        let list = build_format_list(&[
            combined("first", 1080, 10),
            combined("second", 1080, 99),
            combined("low", 480, 1),
        ]);
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].format_id, "first");
        assert_eq!(list[0].acodec, "mp4a");
    }

    #[test]
    fn test_synthesizes_from_split_streams() {
        let list = build_format_list(&[
            video_only("v1080", 1080, 100),
            video_only("v720", 720, 50),
            video_only("v360", 360, 10),
            audio_only("a-small", 3),
            audio_only("a-large", 7),
        ]);

        assert_eq!(resolutions(&list), vec!["720p", "1080p"]);
        assert_eq!(list[0].filesize, 57);
        assert_eq!(list[1].filesize, 107);
        assert!(list.iter().all(|f| f.acodec == "merged"));
    }

    #[test]
    fn test_defaults_for_missing_fields() {
        let list = build_format_list(&[RawFormat {
            format_id: "bare".to_string(),
            height: Some(720),
            ..Default::default()
        }]);

        assert_eq!(list[0].ext, "mp4");
        assert_eq!(list[0].fps, 30.0);
        assert_eq!(list[0].vcodec, "unknown");
        assert_eq!(list[0].filesize, 0);
    }

    #[test]
    fn test_nothing_above_threshold() {
        assert!(build_format_list(&[combined("sd", 480, 1), audio_only("a", 2)]).is_empty());
    }
}
