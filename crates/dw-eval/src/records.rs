//! Evaluation value types.

use dw_models::Stream;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lighting regime tag attached to evaluation records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    Day,
    Dusk,
    Night,
    #[default]
    Unknown,
}

impl Scenario {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::Day => "day",
            Scenario::Dusk => "dusk",
            Scenario::Night => "night",
            Scenario::Unknown => "unknown",
        }
    }

    /// Lenient parse used when loading external payloads.
    pub fn parse_lenient(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("day") => Scenario::Day,
            Some("dusk") => Scenario::Dusk,
            Some("night") => Scenario::Night,
            _ => Scenario::Unknown,
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ground-truth or predicted event loaded for evaluation.
///
/// `event_type` stays a free string so unknown types in external payloads
/// still evaluate; ground-truth records always carry `confidence = 1.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub trip_id: String,
    pub event_type: String,
    pub ts_ms_start: i64,
    pub ts_ms_end: i64,
    #[serde(default)]
    pub stream: Stream,
    #[serde(default)]
    pub scenario: Scenario,
    pub confidence: f64,
    /// Unique id within the evaluation run (`<trip_id>:<ordinal>`)
    pub source_id: String,
}

impl EventRecord {
    /// Interval duration, floored at 1 ms.
    pub fn duration_ms(&self) -> i64 {
        (self.ts_ms_end - self.ts_ms_start).max(1)
    }

    pub fn center_ms(&self) -> i64 {
        (self.ts_ms_start + self.ts_ms_end) / 2
    }
}

/// Match outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOutcome {
    Tp,
    Fp,
    Fn,
}

impl MatchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchOutcome::Tp => "tp",
            MatchOutcome::Fp => "fp",
            MatchOutcome::Fn => "fn",
        }
    }
}

/// One matched (or unmatched) prediction / ground-truth pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub trip_id: String,
    pub event_type: String,
    pub stream: Stream,
    pub scenario: Scenario,
    /// Present for TP and FN
    pub gt_id: Option<String>,
    /// Present for TP and FP
    pub pred_id: Option<String>,
    pub confidence: f64,
    pub iou: f64,
    pub outcome: MatchOutcome,
}
