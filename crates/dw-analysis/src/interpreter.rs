//! Signal interpreter: per-frame signals in, candidate activations out.
//!
//! Purely derivative except for two pieces of state it owns: the rolling
//! 60 s PERCLOS window and the eyes-closed streak counter.

use std::collections::VecDeque;

use dw_models::{EventMetadata, EventType};
use dw_signals::{FaceMetrics, LaneReading, SceneReading, SeatbeltReading};
use serde_json::json;

/// PERCLOS window length.
const PERCLOS_WINDOW_MS: i64 = 60_000;

/// Closed-eye streak qualifying as a microsleep.
const MICROSLEEP_MS: i64 = 1_500;

/// One candidate activation handed to the debouncer.
#[derive(Debug, Clone)]
pub struct Activation {
    pub event_type: EventType,
    pub active: bool,
    pub conf: f64,
    pub metadata: EventMetadata,
}

impl Activation {
    fn new(event_type: EventType, active: bool, conf: f64, metadata: EventMetadata) -> Self {
        Self {
            event_type,
            active,
            conf,
            metadata,
        }
    }
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn meta(entries: &[(&str, serde_json::Value)]) -> EventMetadata {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// Folds raw per-frame signals into the eight candidate activations.
#[derive(Debug, Default)]
pub struct SignalInterpreter {
    /// `(now_ms, eyes_closed)` samples, evicted by timestamp
    perclos_window: VecDeque<(i64, u8)>,
    closed_streak_ms: i64,
}

impl SignalInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fraction of closed-eye samples currently in the window.
    pub fn perclos(&self) -> f64 {
        if self.perclos_window.is_empty() {
            return 0.0;
        }
        let closed: u32 = self.perclos_window.iter().map(|(_, c)| *c as u32).sum();
        closed as f64 / self.perclos_window.len() as f64
    }

    /// Candidate activations for a driver-facing frame.
    ///
    /// Also used for the front stream when the trip has no cabin footage.
    pub fn cabin_activations(
        &mut self,
        now_ms: i64,
        delta_ms: u32,
        face: &FaceMetrics,
        seatbelt: SeatbeltReading,
        scene: &SceneReading,
    ) -> Vec<Activation> {
        self.perclos_window
            .push_back((now_ms, u8::from(face.eyes_closed)));
        while let Some(&(ts, _)) = self.perclos_window.front() {
            if now_ms - ts > PERCLOS_WINDOW_MS {
                self.perclos_window.pop_front();
            } else {
                break;
            }
        }

        let closed_ratio = self.perclos();
        let fatigue_active = closed_ratio > 0.35;
        let fatigue_conf = face
            .fatigue_conf
            .max((closed_ratio - 0.25) * 2.0)
            .min(1.0);

        if face.eyes_closed {
            self.closed_streak_ms += delta_ms as i64;
        } else {
            self.closed_streak_ms = 0;
        }
        let microsleep_active = self.closed_streak_ms >= MICROSLEEP_MS;
        let microsleep_conf = (self.closed_streak_ms as f64 / 3000.0).min(1.0);

        vec![
            Activation::new(
                EventType::DriverFatigue,
                fatigue_active,
                fatigue_conf,
                meta(&[("perclos", json!(round3(closed_ratio)))]),
            ),
            Activation::new(
                EventType::Microsleep,
                microsleep_active,
                microsleep_conf,
                meta(&[("closed_ms", json!(self.closed_streak_ms))]),
            ),
            Activation::new(
                EventType::DistractedDriving,
                face.distracted_active,
                face.distracted_conf,
                meta(&[("yaw_ratio", json!(round3(face.yaw_ratio)))]),
            ),
            Activation::new(
                EventType::MobilePhoneUse,
                scene.phone,
                scene.phone_conf,
                EventMetadata::new(),
            ),
            Activation::new(
                EventType::SeatbeltNotWorn,
                seatbelt.missing,
                seatbelt.confidence,
                EventMetadata::new(),
            ),
        ]
    }

    /// Candidate activations for a road-facing frame.
    pub fn front_activations(&self, lane: &LaneReading, scene: &SceneReading) -> Vec<Activation> {
        vec![
            Activation::new(
                EventType::LaneDeviation,
                lane.deviated,
                lane.confidence,
                meta(&[("offset_ratio", json!(round3(lane.offset_ratio)))]),
            ),
            Activation::new(
                EventType::ObstructionAhead,
                scene.obstruction,
                scene.obstruction_conf,
                meta(&[("lead_distance_m", json!(round2(scene.lead_distance_m)))]),
            ),
            Activation::new(
                EventType::Tailgating,
                scene.tailgating,
                scene.tailgating_conf,
                meta(&[("lead_distance_m", json!(round2(scene.lead_distance_m)))]),
            ),
        ]
    }
}
