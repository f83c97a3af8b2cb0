//! Evaluation Engine.
//!
//! Matches predicted events against ground truth under a joint temporal
//! IoU / center-tolerance rule, aggregates sliced classification metrics,
//! sweeps confidence thresholds and reports calibration (ECE and Brier).
//!
//! The engine is deterministic: given identical inputs and a fixed report
//! id it produces byte-identical output files.

pub mod error;
pub mod io;
pub mod matching;
pub mod metrics;
pub mod records;
pub mod run;

pub use error::{EvalError, EvalResult};
pub use io::{filter_events_by_trip_ids, load_ground_truth, load_predictions};
pub use matching::{center_distance_ms, match_events, temporal_iou};
pub use metrics::{
    calibration_metrics, evaluate, metrics_from_matches, threshold_sweep, Calibration,
    EvalConfig, Evaluation, Metrics, ThresholdSweep,
};
pub use records::{EventRecord, MatchOutcome, MatchResult, Scenario};
pub use run::{
    default_report_id, run_eval, run_eval_for_date_range, run_eval_from_paths, EvalRunSummary,
};
