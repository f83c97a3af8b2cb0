//! Safety event types, debounce rules and emitted events.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Which camera a frame or event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum Stream {
    /// Forward road camera
    Front,
    /// Rear camera (stream hint only; analysis treats it as front-facing)
    Rear,
    /// In-cabin driver camera
    Cabin,
    /// Not specified (ground-truth records may omit the stream)
    #[default]
    Unknown,
}

impl Stream {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stream::Front => "front",
            Stream::Rear => "rear",
            Stream::Cabin => "cabin",
            Stream::Unknown => "unknown",
        }
    }

    /// Lenient parse used when loading external payloads.
    pub fn parse_lenient(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("front") => Stream::Front,
            Some("rear") => Stream::Rear,
            Some("cabin") => Stream::Cabin,
            _ => Stream::Unknown,
        }
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scoring category an event type contributes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Fatigue,
    Distraction,
    Lane,
    Following,
}

impl EventCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventCategory::Fatigue => "fatigue",
            EventCategory::Distraction => "distraction",
            EventCategory::Lane => "lane",
            EventCategory::Following => "following",
        }
    }
}

/// Per-type debounce rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceRule {
    /// Minimum sustained activation before an emission is allowed
    pub min_duration_ms: i64,
    /// Minimum gap between successive emissions of the same type
    pub cooldown_ms: i64,
}

/// The eight detectable safety event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    DriverFatigue,
    Microsleep,
    DistractedDriving,
    LaneDeviation,
    MobilePhoneUse,
    SeatbeltNotWorn,
    ObstructionAhead,
    Tailgating,
}

/// All event types in debouncer cell order.
pub const ALL_EVENT_TYPES: [EventType; 8] = [
    EventType::DriverFatigue,
    EventType::Microsleep,
    EventType::DistractedDriving,
    EventType::LaneDeviation,
    EventType::MobilePhoneUse,
    EventType::SeatbeltNotWorn,
    EventType::ObstructionAhead,
    EventType::Tailgating,
];

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::DriverFatigue => "driver_fatigue",
            EventType::Microsleep => "microsleep",
            EventType::DistractedDriving => "distracted_driving",
            EventType::LaneDeviation => "lane_deviation",
            EventType::MobilePhoneUse => "mobile_phone_use",
            EventType::SeatbeltNotWorn => "seatbelt_not_worn",
            EventType::ObstructionAhead => "obstruction_ahead",
            EventType::Tailgating => "tailgating",
        }
    }

    /// Index into the fixed debouncer cell array.
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn rule(&self) -> DebounceRule {
        let (min_duration_ms, cooldown_ms) = match self {
            EventType::DriverFatigue => (15_000, 20_000),
            EventType::Microsleep => (1_500, 8_000),
            EventType::DistractedDriving => (2_000, 7_000),
            EventType::LaneDeviation => (700, 4_000),
            EventType::MobilePhoneUse => (1_000, 6_000),
            EventType::SeatbeltNotWorn => (3_000, 20_000),
            EventType::ObstructionAhead => (800, 4_000),
            EventType::Tailgating => (1_500, 5_000),
        };
        DebounceRule {
            min_duration_ms,
            cooldown_ms,
        }
    }

    /// Penalty weight used by the scorer.
    pub fn weight(&self) -> f64 {
        match self {
            EventType::DriverFatigue => 2.2,
            EventType::Microsleep => 3.0,
            EventType::DistractedDriving => 1.9,
            EventType::MobilePhoneUse => 2.0,
            EventType::SeatbeltNotWorn => 1.6,
            EventType::LaneDeviation => 1.5,
            EventType::Tailgating => 1.8,
            EventType::ObstructionAhead => 1.4,
        }
    }

    pub fn category(&self) -> EventCategory {
        match self {
            EventType::DriverFatigue | EventType::Microsleep => EventCategory::Fatigue,
            EventType::DistractedDriving
            | EventType::MobilePhoneUse
            | EventType::SeatbeltNotWorn => EventCategory::Distraction,
            EventType::LaneDeviation => EventCategory::Lane,
            EventType::Tailgating | EventType::ObstructionAhead => EventCategory::Following,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_EVENT_TYPES
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownEventType(s.to_string()))
    }
}

/// Error returned when parsing an unrecognized event type string.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown event type: {0}")]
pub struct UnknownEventType(pub String);

/// Free-form per-event metadata (e.g. `perclos`, `lead_distance_m`).
///
/// `serde_json::Map` keeps keys sorted, so serialized reports are
/// byte-stable across runs.
pub type EventMetadata = serde_json::Map<String, serde_json::Value>;

/// An emitted safety event.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Event {
    /// Event type
    #[serde(rename = "type")]
    pub event_type: EventType,

    /// Bout onset, trip-global milliseconds
    pub ts_ms_start: i64,

    /// Emission time, trip-global milliseconds
    pub ts_ms_end: i64,

    /// Severity in [0, 1] (the debouncer EMA at emission)
    pub severity: f64,

    /// Stream the event was observed on
    pub stream: Stream,

    /// Source clip file name
    pub clip_name: String,

    /// Detector-specific metadata
    #[serde(default)]
    pub metadata: EventMetadata,

    /// Seconds into the source clip at emission
    #[serde(default)]
    pub local_ts_sec: f64,

    /// Absolute path of the source clip; not part of the report schema
    #[serde(skip)]
    #[schemars(skip)]
    pub video_path: Option<PathBuf>,
}

impl Event {
    pub fn duration_ms(&self) -> i64 {
        self.ts_ms_end - self.ts_ms_start
    }

    /// Event center, trip-global milliseconds.
    pub fn center_ms(&self) -> i64 {
        (self.ts_ms_start + self.ts_ms_end) / 2
    }
}
