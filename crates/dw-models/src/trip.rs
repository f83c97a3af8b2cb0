//! Trip report payloads (the `report.json` schema).

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::event::Event;
use crate::score::CategoryScores;

/// Terminal status of a trip analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum TripStatus {
    #[default]
    Processing,
    Done,
    Failed,
}

impl TripStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripStatus::Processing => "processing",
            TripStatus::Done => "done",
            TripStatus::Failed => "failed",
        }
    }
}

/// Trip-level attributes carried into the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
pub struct TripInfo {
    pub driver_id: Option<String>,
    pub vehicle_id: Option<String>,
    /// Total decoded duration across all segments, seconds
    pub duration_seconds: f64,
    /// Scalar front/cabin sync offset, seconds
    pub sync_offset_seconds: f64,
    /// Recording day folder (e.g. `2024-06-01`), when known
    pub day_folder: Option<String>,
}

/// Per-trip analysis report.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TripReport {
    pub trip_id: String,

    /// Report generation time, ISO-8601 UTC
    pub generated_at: DateTime<Utc>,

    pub trip: TripInfo,

    pub scores: CategoryScores,

    pub events: Vec<Event>,

    /// Human-readable notes about degraded signal providers
    pub limitations: Vec<String>,

    #[serde(default)]
    pub status: TripStatus,

    /// Error message for failed runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TripReport {
    /// File name of the per-trip report inside its report directory.
    pub const FILE_NAME: &'static str = "report.json";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::CategoryScores;

    #[test]
    fn test_report_serde_round_trip() {
        let report = TripReport {
            trip_id: "trip-001".to_string(),
            generated_at: Utc::now(),
            trip: TripInfo {
                driver_id: Some("driver-7".to_string()),
                vehicle_id: None,
                duration_seconds: 640.5,
                sync_offset_seconds: 2.0,
                day_folder: Some("2024-06-01".to_string()),
            },
            scores: CategoryScores::perfect(640.5),
            events: vec![],
            limitations: vec!["object detector unavailable".to_string()],
            status: TripStatus::Done,
            error: None,
        };

        let json = serde_json::to_string_pretty(&report).expect("serialize");
        let decoded: TripReport = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(decoded.trip_id, "trip-001");
        assert_eq!(decoded.status, TripStatus::Done);
        assert_eq!(decoded.trip.sync_offset_seconds, 2.0);
        assert!(!json.contains("\"error\""));
    }
}
