//! Trip report assembly and persistence.

use std::path::{Path, PathBuf};

use chrono::Utc;
use dw_models::{CategoryScores, Event, TripInfo, TripReport, TripStatus};
use tracing::info;

use crate::error::{AnalysisError, AnalysisResult};

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

/// Build a successful trip report.
pub fn build_report(
    trip_id: &str,
    trip: TripInfo,
    scores: CategoryScores,
    mut events: Vec<Event>,
    limitations: Vec<String>,
) -> TripReport {
    for event in &mut events {
        event.severity = round3(event.severity);
    }
    TripReport {
        trip_id: trip_id.to_string(),
        generated_at: Utc::now(),
        trip,
        scores,
        events,
        limitations,
        status: TripStatus::Done,
        error: None,
    }
}

/// Build a failed trip report carrying the error message.
pub fn build_failed_report(trip_id: &str, trip: TripInfo, error: &str) -> TripReport {
    TripReport {
        trip_id: trip_id.to_string(),
        generated_at: Utc::now(),
        trip,
        scores: CategoryScores::perfect(0.0),
        events: Vec::new(),
        limitations: Vec::new(),
        status: TripStatus::Failed,
        error: Some(error.to_string()),
    }
}

/// Write `report.json` under `<report_dir>/<trip_id>/` and return its path.
pub fn write_report(report_dir: &Path, report: &TripReport) -> AnalysisResult<PathBuf> {
    let trip_dir = report_dir.join(&report.trip_id);
    std::fs::create_dir_all(&trip_dir)?;

    let path = trip_dir.join(TripReport::FILE_NAME);
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(&path, json)
        .map_err(|e| AnalysisError::ReportWrite(format!("{}: {e}", path.display())))?;

    info!(trip_id = %report.trip_id, path = %path.display(), "Wrote trip report");
    Ok(path)
}
