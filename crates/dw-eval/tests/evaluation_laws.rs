//! Evaluation laws exercised through the public API.

use std::collections::BTreeSet;

use dw_eval::{
    evaluate, load_ground_truth, load_predictions, match_events, run_eval, EvalConfig,
    MatchOutcome,
};
use serde_json::json;

fn write_json(path: &std::path::Path, value: serde_json::Value) {
    std::fs::write(path, value.to_string()).expect("write fixture");
}

#[test]
fn ground_truth_matches_itself_perfectly() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let gt_path = tmp.path().join("gt.json");
    write_json(
        &gt_path,
        json!({
            "trips": [
                {"trip_id": "T1", "events": [
                    {"type": "distracted_driving", "ts_ms_start": 1000, "ts_ms_end": 5000, "stream": "cabin"},
                    {"type": "lane_deviation", "ts_ms_start": 7000, "ts_ms_end": 9000, "stream": "front"},
                ]},
                {"trip_id": "T2", "events": [
                    {"type": "tailgating", "ts_ms_start": 0, "ts_ms_end": 3000},
                ]},
            ]
        }),
    );

    let gt = load_ground_truth(&gt_path).expect("load gt");
    // Evaluate the ground truth against itself (as predictions)
    let pred = load_predictions(&gt_path).expect("load as predictions");

    let result = evaluate(&gt, &pred, EvalConfig::default());
    assert_eq!(result.overall.tp, 3);
    assert_eq!(result.overall.fp, 0);
    assert_eq!(result.overall.fn_count, 0);
    assert_eq!(result.overall.precision, 1.0);
    assert_eq!(result.overall.recall, 1.0);
    assert_eq!(result.overall.f1, 1.0);
}

#[test]
fn tp_prediction_count_equals_tp_gt_count() {
    let gt = load_records(json!({
        "trips": [{"trip_id": "T", "events": [
            {"type": "tailgating", "ts_ms_start": 0, "ts_ms_end": 2000},
            {"type": "tailgating", "ts_ms_start": 10_000, "ts_ms_end": 12_000},
        ]}]
    }));
    let pred = load_pred_records(json!({
        "trips": [{"trip_id": "T", "events": [
            {"type": "tailgating", "ts_ms_start": 100, "ts_ms_end": 2100, "severity": 0.9},
            {"type": "tailgating", "ts_ms_start": 50_000, "ts_ms_end": 52_000, "severity": 0.8},
        ]}]
    }));

    let matches = match_events(&gt, &pred, 0.3, 1_200);
    let tp_preds: BTreeSet<_> = matches
        .iter()
        .filter(|m| m.outcome == MatchOutcome::Tp)
        .filter_map(|m| m.pred_id.clone())
        .collect();
    let tp_gts: BTreeSet<_> = matches
        .iter()
        .filter(|m| m.outcome == MatchOutcome::Tp)
        .filter_map(|m| m.gt_id.clone())
        .collect();
    assert_eq!(tp_preds.len(), tp_gts.len());

    // Partition: every prediction is TP or FP, every GT is TP or FN
    let fp = matches.iter().filter(|m| m.outcome == MatchOutcome::Fp).count();
    let fn_ = matches.iter().filter(|m| m.outcome == MatchOutcome::Fn).count();
    assert_eq!(tp_preds.len() + fp, pred.len());
    assert_eq!(tp_gts.len() + fn_, gt.len());
}

#[test]
fn center_tolerance_exercises_iou_one_branch() {
    // iou_threshold 1.0 rejects everything except exact overlaps, so the
    // center-distance branch alone must produce the match.
    let gt = load_records(json!({
        "trips": [{"trip_id": "T", "events": [
            {"type": "tailgating", "ts_ms_start": 1000, "ts_ms_end": 3000},
        ]}]
    }));
    let pred = load_pred_records(json!({
        "trips": [{"trip_id": "T", "events": [
            {"type": "tailgating", "ts_ms_start": 2000, "ts_ms_end": 4000, "severity": 0.9},
        ]}]
    }));

    let matches = match_events(&gt, &pred, 1.0, i64::MAX);
    assert!(matches.iter().any(|m| m.outcome == MatchOutcome::Tp));

    let matches = match_events(&gt, &pred, 1.0, 0);
    assert!(matches.iter().all(|m| m.outcome != MatchOutcome::Tp));
}

#[test]
fn calibration_matches_hand_computed_example() {
    // Ten predictions at confidence 0.9, six of them true positives:
    // single-bucket ECE = |0.6 - 0.9| = 0.30, Brier = 0.330
    let gt_events: Vec<serde_json::Value> = (0..6)
        .map(|i| {
            json!({"type": "tailgating",
                   "ts_ms_start": i * 100_000,
                   "ts_ms_end": i * 100_000 + 2000})
        })
        .collect();
    let pred_events: Vec<serde_json::Value> = (0..10)
        .map(|i| {
            json!({"type": "tailgating",
                   "ts_ms_start": i * 100_000,
                   "ts_ms_end": i * 100_000 + 2000,
                   "severity": 0.9})
        })
        .collect();

    let gt = load_records(json!({"trips": [{"trip_id": "T", "events": gt_events}]}));
    let pred = load_pred_records(json!({"trips": [{"trip_id": "T", "events": pred_events}]}));

    let result = evaluate(&gt, &pred, EvalConfig { bins: 1, ..Default::default() });
    assert_eq!(result.overall.tp, 6);
    assert_eq!(result.overall.fp, 4);
    assert!((result.calibration.ece - 0.30).abs() < 1e-9);
    assert!((result.calibration.brier - 0.33).abs() < 1e-9);
}

#[test]
fn full_run_is_reproducible() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let gt_path = tmp.path().join("gt.json");
    write_json(
        &gt_path,
        json!({"trips": [{"trip_id": "T", "events": [
            {"type": "microsleep", "ts_ms_start": 0, "ts_ms_end": 1500},
        ]}]}),
    );

    let gt = load_ground_truth(&gt_path).expect("gt");
    let trip_ids: BTreeSet<String> = ["T".to_string()].into();

    run_eval(&gt, &gt, EvalConfig::default(), tmp.path(), "run1", &trip_ids).unwrap();
    run_eval(&gt, &gt, EvalConfig::default(), tmp.path(), "run2", &trip_ids).unwrap();

    for file in ["evaluation.json", "threshold_sweep.csv", "metrics_by_event.csv"] {
        let a = std::fs::read(tmp.path().join("run1").join(file)).unwrap();
        let b = std::fs::read(tmp.path().join("run2").join(file)).unwrap();
        assert_eq!(a, b, "{file} must be byte-identical across runs");
    }
}

fn load_records(payload: serde_json::Value) -> Vec<dw_eval::EventRecord> {
    let tmp = tempfile::tempdir().expect("tempdir");
    let path = tmp.path().join("payload.json");
    write_json(&path, payload);
    load_ground_truth(&path).expect("load")
}

fn load_pred_records(payload: serde_json::Value) -> Vec<dw_eval::EventRecord> {
    let tmp = tempfile::tempdir().expect("tempdir");
    let path = tmp.path().join("payload.json");
    write_json(&path, payload);
    load_predictions(&path).expect("load")
}
