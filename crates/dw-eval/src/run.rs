//! Evaluation run orchestration: load, evaluate, write the report
//! directory.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::error::{EvalError, EvalResult};
use crate::io::{filter_events_by_trip_ids, load_ground_truth, load_predictions};
use crate::metrics::{evaluate, BestThreshold, EvalConfig, Evaluation, Metrics};
use crate::records::EventRecord;

/// Calibration excerpt carried into `summary.json`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummaryCalibration {
    pub ece: f64,
    pub brier: f64,
}

/// The `summary.json` payload, also returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalRunSummary {
    pub report_id: String,
    pub overall: Metrics,
    pub global_best_threshold: BestThreshold,
    pub calibration: SummaryCalibration,
    pub selected_trip_count: usize,
    pub output_dir: String,
}

/// Timestamped report id, e.g. `eval_20240601_153000`.
pub fn default_report_id(prefix: &str) -> String {
    format!("{prefix}_{}", Utc::now().format("%Y%m%d_%H%M%S"))
}

fn write_csv(path: &Path, headers: &[String], rows: &[Vec<String>]) -> EvalResult<()> {
    if rows.is_empty() {
        std::fs::write(path, "")?;
        return Ok(());
    }
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(headers)?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

fn fmt_num(v: f64) -> String {
    // Trim trailing zeros the way serde_json prints numbers
    serde_json::to_string(&Value::from(v)).unwrap_or_else(|_| v.to_string())
}

fn metrics_row(metrics: &Metrics) -> Vec<String> {
    vec![
        metrics.tp.to_string(),
        metrics.fp.to_string(),
        metrics.fn_count.to_string(),
        fmt_num(metrics.precision),
        fmt_num(metrics.recall),
        fmt_num(metrics.f1),
    ]
}

fn write_slice_csv(
    path: &Path,
    key_header: &str,
    slices: &std::collections::BTreeMap<String, Metrics>,
) -> EvalResult<()> {
    let headers: Vec<String> = [key_header, "tp", "fp", "fn", "precision", "recall", "f1"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let rows: Vec<Vec<String>> = slices
        .iter()
        .map(|(key, metrics)| {
            let mut row = vec![key.clone()];
            row.extend(metrics_row(metrics));
            row
        })
        .collect();
    write_csv(path, &headers, &rows)
}

fn write_sweep_csv(path: &Path, evaluation: &Evaluation) -> EvalResult<()> {
    let rows = &evaluation.threshold_sweep.rows;
    let Some(first) = rows.first() else {
        std::fs::write(path, "")?;
        return Ok(());
    };

    let mut headers: Vec<String> = ["threshold", "tp", "fp", "fn", "precision", "recall", "f1"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    headers.extend(first.event_f1.keys().cloned());

    let data: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            let mut record = vec![fmt_num(row.threshold)];
            record.extend(metrics_row(&row.overall));
            record.extend(row.event_f1.values().map(|f1| fmt_num(*f1)));
            record
        })
        .collect();
    write_csv(path, &headers, &data)
}

/// Evaluate pre-loaded events and write the report directory
/// `<out_root>/<report_id>/` (evaluation.json, summary.json, four CSVs).
pub fn run_eval(
    gt_events: &[EventRecord],
    pred_events: &[EventRecord],
    config: EvalConfig,
    out_root: &Path,
    report_id: &str,
    selected_trip_ids: &BTreeSet<String>,
) -> EvalResult<EvalRunSummary> {
    let out_dir = out_root.join(report_id);
    std::fs::create_dir_all(&out_dir)?;

    let evaluation = evaluate(gt_events, pred_events, config);

    std::fs::write(
        out_dir.join("evaluation.json"),
        serde_json::to_string_pretty(&evaluation)?,
    )?;

    write_slice_csv(
        &out_dir.join("metrics_by_event.csv"),
        "event_type",
        &evaluation.by_event,
    )?;
    write_slice_csv(
        &out_dir.join("metrics_by_stream.csv"),
        "stream",
        &evaluation.by_stream,
    )?;
    write_slice_csv(
        &out_dir.join("metrics_by_scenario.csv"),
        "scenario",
        &evaluation.by_scenario,
    )?;
    write_sweep_csv(&out_dir.join("threshold_sweep.csv"), &evaluation)?;

    let summary = EvalRunSummary {
        report_id: report_id.to_string(),
        overall: evaluation.overall,
        global_best_threshold: evaluation.threshold_sweep.global_best,
        calibration: SummaryCalibration {
            ece: evaluation.calibration.ece,
            brier: evaluation.calibration.brier,
        },
        selected_trip_count: selected_trip_ids.len(),
        output_dir: out_dir.display().to_string(),
    };
    std::fs::write(
        out_dir.join("summary.json"),
        serde_json::to_string_pretty(&summary)?,
    )?;

    info!(
        report_id,
        tp = summary.overall.tp,
        f1 = summary.overall.f1,
        "Evaluation complete"
    );
    Ok(summary)
}

/// Evaluate a ground-truth file against a predictions file or directory.
pub fn run_eval_from_paths(
    ground_truth: &Path,
    predictions: &Path,
    config: EvalConfig,
    out_root: &Path,
    report_id: &str,
) -> EvalResult<EvalRunSummary> {
    let gt_events = load_ground_truth(ground_truth)?;
    let pred_events = load_predictions(predictions)?;

    let trip_ids: BTreeSet<String> = gt_events
        .iter()
        .chain(pred_events.iter())
        .map(|e| e.trip_id.clone())
        .collect();

    run_eval(&gt_events, &pred_events, config, out_root, report_id, &trip_ids)
}

fn report_generated_date(path: &Path) -> Option<NaiveDate> {
    let payload: Value = serde_json::from_str(&std::fs::read_to_string(path).ok()?).ok()?;
    let stamp = payload.get("generated_at")?.as_str()?;
    stamp.get(0..10)?.parse().ok()
}

/// Evaluate completed trips whose reports were generated within
/// `[date_from, date_to]` (inclusive; either bound may be open).
///
/// Trips are discovered by scanning `report_dir` for per-trip
/// `report.json` files; ground truth and predictions are filtered down to
/// the selected trip ids.
pub fn run_eval_for_date_range(
    ground_truth: &Path,
    report_dir: &Path,
    date_from: Option<NaiveDate>,
    date_to: Option<NaiveDate>,
    config: EvalConfig,
    out_root: &Path,
    report_id: &str,
) -> EvalResult<EvalRunSummary> {
    if !report_dir.exists() {
        return Err(EvalError::InputMissing(report_dir.to_path_buf()));
    }

    let mut trip_ids: BTreeSet<String> = BTreeSet::new();
    let mut entries: Vec<PathBuf> = std::fs::read_dir(report_dir)?
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    entries.sort();

    for trip_dir in entries {
        let report = trip_dir.join("report.json");
        if !report.exists() {
            continue;
        }
        let Some(date) = report_generated_date(&report) else {
            continue;
        };
        if date_from.is_some_and(|from| date < from) || date_to.is_some_and(|to| date > to) {
            continue;
        }
        if let Some(name) = trip_dir.file_name() {
            trip_ids.insert(name.to_string_lossy().into_owned());
        }
    }

    let gt_events = filter_events_by_trip_ids(load_ground_truth(ground_truth)?, &trip_ids);
    let pred_events = filter_events_by_trip_ids(load_predictions(report_dir)?, &trip_ids);

    run_eval(&gt_events, &pred_events, config, out_root, report_id, &trip_ids)
}
