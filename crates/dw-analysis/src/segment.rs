//! Segment assembly and cross-stream synchronization.

use std::path::{Path, PathBuf};

use dw_models::Stream;
use tracing::debug;

use crate::clip::{parse_clip_name, sort_key};
use crate::error::{AnalysisError, AnalysisResult};

/// One clip file scheduled for analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub path: PathBuf,
    pub stream: Stream,
    /// Wall-clock start, seconds since midnight
    pub start_seconds_of_day: u32,
}

impl Segment {
    pub fn clip_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// The assembled per-stream segment lists for one trip.
#[derive(Debug, Clone)]
pub struct TripSegments {
    pub front: Vec<Segment>,
    pub cabin: Vec<Segment>,
    /// `cabin[0].start − front[0].start` (0 when either side is empty)
    pub sync_offset_seconds: f64,
}

fn ordered_segments(folder: &Path, stream: Stream) -> Vec<Segment> {
    let Ok(entries) = std::fs::read_dir(folder) else {
        return Vec::new();
    };

    let mut names: Vec<(String, PathBuf)> = entries
        .flatten()
        .filter(|e| e.path().is_file())
        .filter_map(|e| {
            let path = e.path();
            let name = path.file_name()?.to_string_lossy().into_owned();
            name.to_ascii_lowercase()
                .ends_with(".mp4")
                .then_some((name, path))
        })
        .collect();
    names.sort_by(|a, b| sort_key(&a.0).cmp(&sort_key(&b.0)));

    names
        .into_iter()
        .map(|(name, path)| Segment {
            start_seconds_of_day: parse_clip_name(&name).seconds_of_day(),
            path,
            stream,
        })
        .collect()
}

fn estimate_sync_offset(front: &[Segment], cabin: &[Segment]) -> f64 {
    match (front.first(), cabin.first()) {
        (Some(f), Some(c)) => c.start_seconds_of_day as f64 - f.start_seconds_of_day as f64,
        _ => 0.0,
    }
}

impl TripSegments {
    /// Assemble segments from `<trip_root>/{front,cabin}`.
    ///
    /// Either subfolder may be absent; both empty is fatal.
    pub fn assemble(trip_root: &Path) -> AnalysisResult<Self> {
        let front = ordered_segments(&trip_root.join("front"), Stream::Front);
        let cabin = ordered_segments(&trip_root.join("cabin"), Stream::Cabin);

        if front.is_empty() && cabin.is_empty() {
            return Err(AnalysisError::NoSegments);
        }

        let sync_offset_seconds = estimate_sync_offset(&front, &cabin);
        debug!(
            front = front.len(),
            cabin = cabin.len(),
            sync_offset_seconds,
            "Assembled trip segments"
        );

        Ok(Self {
            front,
            cabin,
            sync_offset_seconds,
        })
    }

    /// All segments in processing order: by wall-clock start; the stable
    /// sort keeps front ahead of cabin when both start in the same second.
    pub fn merged(&self) -> Vec<Segment> {
        let mut all: Vec<Segment> = self.front.iter().chain(self.cabin.iter()).cloned().collect();
        all.sort_by_key(|s| s.start_seconds_of_day);
        all
    }

    pub fn has_cabin(&self) -> bool {
        !self.cabin.is_empty()
    }

    pub fn total(&self) -> usize {
        self.front.len() + self.cabin.len()
    }
}
