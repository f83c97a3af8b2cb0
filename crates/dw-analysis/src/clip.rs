//! Clip file name parsing.
//!
//! Dashcam clips are named `HHMMSS_xxx_yyy_TAG[_rear].mp4`; the six-digit
//! prefix is the wall-clock start time and the middle groups order clips
//! recorded within the same second.

use std::sync::LazyLock;

use dw_models::Stream;
use regex::Regex;

static NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?P<ts>\d{6})_(?P<seq>\d{3}_\d{3}_[A-Za-z0-9]+)(?P<rear>_rear)?\.mp4$")
        .expect("clip name pattern is valid")
});

/// A parsed clip file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipName {
    pub original_name: String,
    /// `HHMMSS` prefix (or the first six stem characters on fallback)
    pub timestamp: String,
    /// Sequence tag ordering clips within one second
    pub sequence: String,
    /// `front` unless the `_rear` suffix is present
    pub stream_hint: Stream,
}

impl ClipName {
    /// Seconds since midnight encoded in the timestamp; 0 when the
    /// timestamp is not a clean `HHMMSS`.
    pub fn seconds_of_day(&self) -> u32 {
        if self.timestamp.len() == 6 && self.timestamp.bytes().all(|b| b.is_ascii_digit()) {
            let h: u32 = self.timestamp[0..2].parse().unwrap_or(0);
            let m: u32 = self.timestamp[2..4].parse().unwrap_or(0);
            let s: u32 = self.timestamp[4..6].parse().unwrap_or(0);
            return h * 3600 + m * 60 + s;
        }
        0
    }
}

/// Parse a clip file name; non-matching names fall back to a zero
/// timestamp and a `front` stream hint.
pub fn parse_clip_name(filename: &str) -> ClipName {
    match NAME_PATTERN.captures(filename) {
        Some(caps) => ClipName {
            original_name: filename.to_string(),
            timestamp: caps["ts"].to_string(),
            sequence: caps["seq"].to_string(),
            stream_hint: if caps.name("rear").is_some() {
                Stream::Rear
            } else {
                Stream::Front
            },
        },
        None => {
            let stem = filename.rsplit_once('.').map(|(s, _)| s).unwrap_or(filename);
            ClipName {
                original_name: filename.to_string(),
                timestamp: stem.chars().take(6).collect(),
                sequence: "unknown".to_string(),
                stream_hint: Stream::Front,
            }
        }
    }
}

/// Sort key ordering clips by `(seconds_of_day, sequence)`.
pub fn sort_key(filename: &str) -> (u32, String) {
    let parsed = parse_clip_name(filename);
    (parsed.seconds_of_day(), parsed.sequence)
}
