//! Ground-truth and prediction loading.
//!
//! Three accepted prediction shapes: a multi-trip payload
//! (`{trips: [{trip_id, events}]}`), a directory searched recursively for
//! per-trip `report.json` files, or a single-trip payload
//! (`{trip_id, events}`).

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::error::{EvalError, EvalResult};
use crate::records::{EventRecord, Scenario};
use dw_models::Stream;

fn to_event(record: &Value, trip_id: &str, idx: usize, predicted: bool) -> EventRecord {
    let meta = record.get("metadata").and_then(Value::as_object);
    let scenario_str = meta
        .and_then(|m| m.get("lighting").or_else(|| m.get("scenario")))
        .or_else(|| record.get("scenario"))
        .and_then(Value::as_str);

    let confidence = record
        .get("severity")
        .or_else(|| record.get("confidence"))
        .and_then(Value::as_f64)
        .unwrap_or(1.0);

    EventRecord {
        trip_id: trip_id.to_string(),
        event_type: record
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string(),
        ts_ms_start: record.get("ts_ms_start").and_then(Value::as_i64).unwrap_or(0),
        ts_ms_end: record.get("ts_ms_end").and_then(Value::as_i64).unwrap_or(0),
        stream: Stream::parse_lenient(record.get("stream").and_then(Value::as_str)),
        scenario: Scenario::parse_lenient(scenario_str),
        // Ground truth is always fully confident; predictions clamp to [0, 1]
        confidence: if predicted { confidence.clamp(0.0, 1.0) } else { 1.0 },
        source_id: format!("{trip_id}:{idx}"),
    }
}

fn load_json(path: &Path) -> EvalResult<Value> {
    if !path.exists() {
        return Err(EvalError::InputMissing(path.to_path_buf()));
    }
    let text = std::fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|e| EvalError::malformed(path, e.to_string()))
}

fn events_of_trip(trip: &Value, default_trip_id: &str, predicted: bool) -> Vec<EventRecord> {
    let trip_id = trip
        .get("trip_id")
        .and_then(Value::as_str)
        .unwrap_or(default_trip_id);
    trip.get("events")
        .and_then(Value::as_array)
        .map(|events| {
            events
                .iter()
                .enumerate()
                .map(|(i, ev)| to_event(ev, trip_id, i + 1, predicted))
                .collect()
        })
        .unwrap_or_default()
}

/// Load ground truth (`{trips: [{trip_id, events}]}`).
pub fn load_ground_truth(path: impl AsRef<Path>) -> EvalResult<Vec<EventRecord>> {
    let payload = load_json(path.as_ref())?;
    let mut events = Vec::new();
    if let Some(trips) = payload.get("trips").and_then(Value::as_array) {
        for trip in trips {
            events.extend(events_of_trip(trip, "unknown", false));
        }
    }
    Ok(events)
}

fn find_report_files(root: &Path, found: &mut Vec<PathBuf>) -> EvalResult<()> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(root)?
        .flatten()
        .map(|e| e.path())
        .collect();
    entries.sort();

    for path in entries {
        if path.is_dir() {
            find_report_files(&path, found)?;
        } else if path.file_name().is_some_and(|n| n == "report.json") {
            found.push(path);
        }
    }
    Ok(())
}

/// Load predictions from a payload file or a report directory tree.
pub fn load_predictions(path: impl AsRef<Path>) -> EvalResult<Vec<EventRecord>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(EvalError::InputMissing(path.to_path_buf()));
    }

    let mut events = Vec::new();

    if path.is_dir() {
        let mut reports = Vec::new();
        find_report_files(path, &mut reports)?;
        debug!(root = %path.display(), reports = reports.len(), "Scanning prediction reports");

        for report in reports {
            let payload = load_json(&report)?;
            let parent_name = report
                .parent()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "unknown".to_string());
            let trip_id = payload
                .get("trip_id")
                .and_then(Value::as_str)
                .unwrap_or(&parent_name)
                .to_string();
            if let Some(list) = payload.get("events").and_then(Value::as_array) {
                events.extend(
                    list.iter()
                        .enumerate()
                        .map(|(i, ev)| to_event(ev, &trip_id, i + 1, true)),
                );
            }
        }
        return Ok(events);
    }

    let payload = load_json(path)?;
    if let Some(trips) = payload.get("trips").and_then(Value::as_array) {
        for trip in trips {
            events.extend(events_of_trip(trip, "unknown", true));
        }
        return Ok(events);
    }

    // Single-trip payload
    events.extend(events_of_trip(&payload, "unknown", true));
    Ok(events)
}

/// Keep only events belonging to `trip_ids`; empty selection keeps nothing.
pub fn filter_events_by_trip_ids(
    events: Vec<EventRecord>,
    trip_ids: &BTreeSet<String>,
) -> Vec<EventRecord> {
    if trip_ids.is_empty() {
        return Vec::new();
    }
    events
        .into_iter()
        .filter(|ev| trip_ids.contains(&ev.trip_id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_load_ground_truth_forces_full_confidence() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("gt.json");
        std::fs::write(
            &path,
            json!({
                "trips": [{
                    "trip_id": "T1",
                    "events": [
                        {"type": "tailgating", "ts_ms_start": 0, "ts_ms_end": 2000,
                         "severity": 0.4, "stream": "front",
                         "metadata": {"lighting": "night"}},
                    ]
                }]
            })
            .to_string(),
        )
        .unwrap();

        let events = load_ground_truth(&path).expect("load");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].confidence, 1.0);
        assert_eq!(events[0].scenario, Scenario::Night);
        assert_eq!(events[0].stream, Stream::Front);
        assert_eq!(events[0].source_id, "T1:1");
    }

    #[test]
    fn test_missing_input() {
        let err = load_ground_truth("/nonexistent/gt.json").unwrap_err();
        assert!(matches!(err, EvalError::InputMissing(_)));
    }

    #[test]
    fn test_malformed_input() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = load_ground_truth(&path).unwrap_err();
        assert!(matches!(err, EvalError::Malformed { .. }));
    }

    #[test]
    fn test_prediction_confidence_clamped() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("pred.json");
        std::fs::write(
            &path,
            json!({
                "trip_id": "T1",
                "events": [
                    {"type": "tailgating", "ts_ms_start": 0, "ts_ms_end": 2000, "severity": 1.7},
                    {"type": "tailgating", "ts_ms_start": 3000, "ts_ms_end": 4000, "confidence": -0.2},
                ]
            })
            .to_string(),
        )
        .unwrap();

        let events = load_predictions(&path).expect("load");
        assert_eq!(events[0].confidence, 1.0);
        assert_eq!(events[1].confidence, 0.0);
    }

    #[test]
    fn test_prediction_directory_scan() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let trip_a = tmp.path().join("trips").join("A");
        let trip_b = tmp.path().join("trips").join("B");
        std::fs::create_dir_all(&trip_a).unwrap();
        std::fs::create_dir_all(&trip_b).unwrap();

        std::fs::write(
            trip_a.join("report.json"),
            json!({"trip_id": "A", "events": [
                {"type": "microsleep", "ts_ms_start": 0, "ts_ms_end": 1500, "severity": 0.7}
            ]})
            .to_string(),
        )
        .unwrap();
        // No trip_id: falls back to the directory name
        std::fs::write(
            trip_b.join("report.json"),
            json!({"events": [
                {"type": "tailgating", "ts_ms_start": 0, "ts_ms_end": 2000, "severity": 0.9}
            ]})
            .to_string(),
        )
        .unwrap();

        let mut events = load_predictions(tmp.path()).expect("load");
        events.sort_by(|a, b| a.trip_id.cmp(&b.trip_id));
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].trip_id, "A");
        assert_eq!(events[1].trip_id, "B");
    }

    #[test]
    fn test_filter_by_trip_ids() {
        let make = |trip: &str| EventRecord {
            trip_id: trip.to_string(),
            event_type: "tailgating".to_string(),
            ts_ms_start: 0,
            ts_ms_end: 1000,
            stream: Stream::Unknown,
            scenario: Scenario::Unknown,
            confidence: 1.0,
            source_id: format!("{trip}:1"),
        };
        let events = vec![make("A"), make("B")];

        let selected: BTreeSet<String> = ["A".to_string()].into();
        let kept = filter_events_by_trip_ids(events.clone(), &selected);
        assert_eq!(kept.len(), 1);

        assert!(filter_events_by_trip_ids(events, &BTreeSet::new()).is_empty());
    }
}
