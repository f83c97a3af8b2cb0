//! Per-trip category scores.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Accumulated penalty per scoring category.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct CategoryPenalties {
    pub fatigue: f64,
    pub distraction: f64,
    pub lane: f64,
    pub following: f64,
}

/// Supporting detail attached to a trip's scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScoreDetails {
    /// Raw (un-normalized) penalty totals per category
    pub penalties: CategoryPenalties,
    /// Emitted event count per event type
    pub event_counts: BTreeMap<String, usize>,
    /// Total emitted events
    pub total_events: usize,
    /// Trip duration in seconds, rounded to 2 decimals
    pub duration_seconds: f64,
}

/// Category sub-scores plus the overall score, all in [0, 100].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CategoryScores {
    pub fatigue_score: f64,
    pub distraction_score: f64,
    pub lane_score: f64,
    pub following_distance_score: f64,
    /// Arithmetic mean of the four sub-scores, rounded to 2 decimals
    pub overall_score: f64,
    pub details: ScoreDetails,
}

impl CategoryScores {
    /// A perfect score for a trip with no events.
    pub fn perfect(duration_seconds: f64) -> Self {
        Self {
            fatigue_score: 100.0,
            distraction_score: 100.0,
            lane_score: 100.0,
            following_distance_score: 100.0,
            overall_score: 100.0,
            details: ScoreDetails {
                penalties: CategoryPenalties::default(),
                event_counts: BTreeMap::new(),
                total_events: 0,
                duration_seconds: (duration_seconds * 100.0).round() / 100.0,
            },
        }
    }
}
