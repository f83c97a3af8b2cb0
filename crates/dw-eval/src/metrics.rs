//! Classification metrics, slices, threshold sweep and calibration.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::matching::match_events;
use crate::records::{EventRecord, MatchOutcome, MatchResult};

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

fn round5(v: f64) -> f64 {
    (v * 100_000.0).round() / 100_000.0
}

fn safe_div(a: f64, b: f64) -> f64 {
    if b == 0.0 {
        0.0
    } else {
        a / b
    }
}

/// Precision/recall/F1 counts for one match set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub tp: usize,
    pub fp: usize,
    #[serde(rename = "fn")]
    pub fn_count: usize,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Compute metrics over a match set; all ratios rounded to 4 decimals.
pub fn metrics_from_matches(matches: &[MatchResult]) -> Metrics {
    let tp = matches.iter().filter(|m| m.outcome == MatchOutcome::Tp).count();
    let fp = matches.iter().filter(|m| m.outcome == MatchOutcome::Fp).count();
    let fn_count = matches.iter().filter(|m| m.outcome == MatchOutcome::Fn).count();

    let precision = safe_div(tp as f64, (tp + fp) as f64);
    let recall = safe_div(tp as f64, (tp + fn_count) as f64);
    let f1 = safe_div(2.0 * precision * recall, precision + recall);

    Metrics {
        tp,
        fp,
        fn_count,
        precision: round4(precision),
        recall: round4(recall),
        f1: round4(f1),
    }
}

/// Metrics per slice key (event type, stream or scenario), sorted by key.
pub fn sliced_metrics(
    matches: &[MatchResult],
    key_fn: impl Fn(&MatchResult) -> String,
) -> BTreeMap<String, Metrics> {
    let mut grouped: BTreeMap<String, Vec<MatchResult>> = BTreeMap::new();
    for m in matches {
        grouped.entry(key_fn(m)).or_default().push(m.clone());
    }
    grouped
        .into_iter()
        .map(|(k, v)| (k, metrics_from_matches(&v)))
        .collect()
}

/// One row of the threshold sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepRow {
    pub threshold: f64,
    #[serde(flatten)]
    pub overall: Metrics,
    /// Per-type F1, keyed `<event_type>_f1`
    #[serde(flatten)]
    pub event_f1: BTreeMap<String, f64>,
}

/// Best threshold seen for some F1 series; ties keep the first
/// (smallest) threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BestThreshold {
    pub threshold: f64,
    pub f1: f64,
}

/// Threshold sweep output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSweep {
    pub rows: Vec<SweepRow>,
    pub global_best: BestThreshold,
    pub per_event_best: BTreeMap<String, BestThreshold>,
}

/// Re-match at confidence thresholds 0.10..=0.95 (step 0.05), tracking the
/// best overall and per-type F1.
pub fn threshold_sweep(
    gt_events: &[EventRecord],
    pred_events: &[EventRecord],
    iou_threshold: f64,
    tolerance_ms: i64,
) -> ThresholdSweep {
    let event_types: BTreeSet<String> = gt_events
        .iter()
        .chain(pred_events.iter())
        .map(|e| e.event_type.clone())
        .collect();

    let mut per_event_best: BTreeMap<String, BestThreshold> = event_types
        .iter()
        .map(|t| {
            (
                t.clone(),
                BestThreshold {
                    threshold: 0.5,
                    f1: -1.0,
                },
            )
        })
        .collect();
    let mut global_best = BestThreshold {
        threshold: 0.5,
        f1: -1.0,
    };

    let mut rows = Vec::new();
    for i in 2..=19 {
        let thr = round2(i as f64 * 0.05);
        let filtered: Vec<EventRecord> = pred_events
            .iter()
            .filter(|p| p.confidence >= thr)
            .cloned()
            .collect();
        let matches = match_events(gt_events, &filtered, iou_threshold, tolerance_ms);
        let overall = metrics_from_matches(&matches);

        if overall.f1 > global_best.f1 {
            global_best = BestThreshold {
                threshold: thr,
                f1: overall.f1,
            };
        }

        let by_event = sliced_metrics(&matches, |m| m.event_type.clone());
        let mut event_f1 = BTreeMap::new();
        for event_type in &event_types {
            let f1 = by_event.get(event_type).map(|m| m.f1).unwrap_or(0.0);
            event_f1.insert(format!("{event_type}_f1"), round4(f1));
            let best = per_event_best.get_mut(event_type).expect("initialized above");
            if f1 > best.f1 {
                *best = BestThreshold { threshold: thr, f1 };
            }
        }

        rows.push(SweepRow {
            threshold: thr,
            overall,
            event_f1,
        });
    }

    ThresholdSweep {
        rows,
        global_best,
        per_event_best,
    }
}

/// One calibration bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationBucket {
    pub bin: usize,
    pub low: f64,
    pub high: f64,
    pub count: usize,
    pub avg_conf: f64,
    pub accuracy: f64,
}

/// Calibration output: ECE, Brier and per-bucket detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub ece: f64,
    pub brier: f64,
    pub bins: Vec<CalibrationBucket>,
}

/// Expected calibration error and Brier score over TP/FP predictions.
///
/// Buckets are equal-width over [0, 1]; the last bucket is closed on both
/// ends. Empty buckets report zeros and do not contribute to ECE.
pub fn calibration_metrics(matches: &[MatchResult], bins: usize) -> Calibration {
    let pred_rows: Vec<&MatchResult> = matches.iter().filter(|m| m.pred_id.is_some()).collect();
    if pred_rows.is_empty() || bins == 0 {
        return Calibration {
            ece: 0.0,
            brier: 0.0,
            bins: Vec::new(),
        };
    }

    let conf: Vec<f64> = pred_rows.iter().map(|m| m.confidence).collect();
    let correct: Vec<f64> = pred_rows
        .iter()
        .map(|m| if m.outcome == MatchOutcome::Tp { 1.0 } else { 0.0 })
        .collect();

    let total = conf.len() as f64;
    let brier = conf
        .iter()
        .zip(&correct)
        .map(|(c, y)| (y - c) * (y - c))
        .sum::<f64>()
        / total;

    let mut bucket_rows = Vec::with_capacity(bins);
    let mut ece = 0.0;

    for i in 0..bins {
        let low = i as f64 / bins as f64;
        let high = (i + 1) as f64 / bins as f64;
        let in_bucket = |c: f64| {
            if i == bins - 1 {
                c >= low && c <= high
            } else {
                c >= low && c < high
            }
        };

        let members: Vec<usize> = (0..conf.len()).filter(|&j| in_bucket(conf[j])).collect();
        if members.is_empty() {
            bucket_rows.push(CalibrationBucket {
                bin: i,
                low,
                high,
                count: 0,
                avg_conf: 0.0,
                accuracy: 0.0,
            });
            continue;
        }

        let n = members.len() as f64;
        let avg_conf = members.iter().map(|&j| conf[j]).sum::<f64>() / n;
        let accuracy = members.iter().map(|&j| correct[j]).sum::<f64>() / n;
        ece += (accuracy - avg_conf).abs() * (n / total);

        bucket_rows.push(CalibrationBucket {
            bin: i,
            low,
            high,
            count: members.len(),
            avg_conf: round4(avg_conf),
            accuracy: round4(accuracy),
        });
    }

    Calibration {
        ece: round5(ece),
        brier: round5(brier),
        bins: bucket_rows,
    }
}

/// Evaluation run parameters echoed into the output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvalConfig {
    pub iou_threshold: f64,
    pub tolerance_ms: i64,
    pub bins: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            iou_threshold: 0.30,
            tolerance_ms: 1_200,
            bins: 10,
        }
    }
}

/// Input dataset counts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DatasetCounts {
    pub ground_truth_events: usize,
    pub predicted_events: usize,
    pub trips_ground_truth: usize,
    pub trips_predicted: usize,
}

/// First-N unmatched examples kept for failure analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureExamples {
    pub false_positives: Vec<MatchResult>,
    pub false_negatives: Vec<MatchResult>,
}

const FAILURE_EXAMPLE_CAP: usize = 200;

/// The full evaluation payload (`evaluation.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub config: EvalConfig,
    pub dataset: DatasetCounts,
    pub overall: Metrics,
    pub by_event: BTreeMap<String, Metrics>,
    pub by_stream: BTreeMap<String, Metrics>,
    pub by_scenario: BTreeMap<String, Metrics>,
    pub calibration: Calibration,
    pub threshold_sweep: ThresholdSweep,
    pub failure_examples: FailureExamples,
    pub matches: Vec<MatchResult>,
}

/// Run the full evaluation: matching, slices, calibration and sweep.
pub fn evaluate(
    gt_events: &[EventRecord],
    pred_events: &[EventRecord],
    config: EvalConfig,
) -> Evaluation {
    let matches = match_events(
        gt_events,
        pred_events,
        config.iou_threshold,
        config.tolerance_ms,
    );

    let trips_of = |events: &[EventRecord]| {
        events
            .iter()
            .map(|e| e.trip_id.clone())
            .collect::<BTreeSet<_>>()
            .len()
    };

    Evaluation {
        config,
        dataset: DatasetCounts {
            ground_truth_events: gt_events.len(),
            predicted_events: pred_events.len(),
            trips_ground_truth: trips_of(gt_events),
            trips_predicted: trips_of(pred_events),
        },
        overall: metrics_from_matches(&matches),
        by_event: sliced_metrics(&matches, |m| m.event_type.clone()),
        by_stream: sliced_metrics(&matches, |m| m.stream.as_str().to_string()),
        by_scenario: sliced_metrics(&matches, |m| m.scenario.as_str().to_string()),
        calibration: calibration_metrics(&matches, config.bins),
        threshold_sweep: threshold_sweep(
            gt_events,
            pred_events,
            config.iou_threshold,
            config.tolerance_ms,
        ),
        failure_examples: FailureExamples {
            false_positives: matches
                .iter()
                .filter(|m| m.outcome == MatchOutcome::Fp)
                .take(FAILURE_EXAMPLE_CAP)
                .cloned()
                .collect(),
            false_negatives: matches
                .iter()
                .filter(|m| m.outcome == MatchOutcome::Fn)
                .take(FAILURE_EXAMPLE_CAP)
                .cloned()
                .collect(),
        },
        matches,
    }
}
