//! Human-readable sizes, rates and durations
//!
//! Used for config values such as `http_chunk_size = "10MB"` and for the
//! progress line printed by the `download` command.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid size format: {0}")]
    InvalidFormat(String),

    #[error("Invalid number: {0}")]
    InvalidNumber(#[from] std::num::ParseIntError),

    #[error("Invalid unit: {0}")]
    InvalidUnit(String),
}

const KIB: u64 = 1024;

const UNITS: &[(&str, u64)] = &[
    ("B", 1),
    ("KB", KIB),
    ("MB", KIB * KIB),
    ("GB", KIB * KIB * KIB),
    ("TB", KIB * KIB * KIB * KIB),
];

/// Byte count, parsed from `"512"`, `"64KB"`, `"10M"` and similar
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ByteSize(pub u64);

impl ByteSize {
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// One decimal place above a kilobyte, trailing `.0` dropped
    pub fn to_human_readable(&self) -> String {
        let (unit, divisor) = UNITS
            .iter()
            .rev()
            .find(|(_, divisor)| self.0 >= *divisor)
            .copied()
            .unwrap_or(UNITS[0]);

        if divisor == 1 {
            return format!("{}{}", self.0, unit);
        }

        let whole = self.0 / divisor;
        let tenth = (self.0 % divisor) * 10 / divisor;
        if tenth == 0 {
            format!("{}{}", whole, unit)
        } else {
            format!("{}.{}{}", whole, tenth, unit)
        }
    }
}

impl<'de> Deserialize<'de> for ByteSize {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct ByteSizeVisitor;

        impl serde::de::Visitor<'_> for ByteSizeVisitor {
            type Value = ByteSize;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a byte size as string (e.g., \"64KB\", \"10MB\") or integer")
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(ByteSize(v))
            }

            // TOML and environment sources hand integers over as i64
            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                u64::try_from(v)
                    .map(ByteSize)
                    .map_err(|_| E::custom(format!("byte size cannot be negative: {}", v)))
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                v.parse::<ByteSize>().map_err(serde::de::Error::custom)
            }
        }

        deserializer.deserialize_any(ByteSizeVisitor)
    }
}

impl FromStr for ByteSize {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_uppercase();

        if let Ok(num) = s.parse::<u64>() {
            return Ok(ByteSize(num));
        }

        let Some(pos) = s.find(|c: char| !c.is_ascii_digit()) else {
            return Err(ParseError::InvalidFormat(s));
        };
        let (num_str, unit) = s.split_at(pos);
        if num_str.is_empty() {
            return Err(ParseError::InvalidFormat(s.clone()));
        }

        let num: u64 = num_str.parse()?;
        let multiplier = match unit.trim() {
            "B" => 1,
            "K" | "KB" | "KIB" => KIB,
            "M" | "MB" | "MIB" => KIB * KIB,
            "G" | "GB" | "GIB" => KIB * KIB * KIB,
            "T" | "TB" | "TIB" => KIB * KIB * KIB * KIB,
            other => return Err(ParseError::InvalidUnit(other.to_string())),
        };

        Ok(ByteSize(num * multiplier))
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_human_readable())
    }
}

/// Transfer rate such as `2.5MB/s`
pub fn rate(bytes_per_sec: f64) -> String {
    let bytes = if bytes_per_sec.is_finite() && bytes_per_sec > 0.0 {
        bytes_per_sec as u64
    } else {
        0
    };
    format!("{}/s", ByteSize(bytes))
}

/// Remaining time as `m:ss`, or `h:mm:ss` past an hour
pub fn eta(seconds: u64) -> String {
    let (h, m, s) = (seconds / 3600, (seconds % 3600) / 60, seconds % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}
