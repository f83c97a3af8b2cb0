//! Driver face signal: EAR/MAR/yaw metrics with fatigue and distraction
//! latches.

use dw_media::VideoFrame;
use tracing::debug;

/// Raw per-frame measurements from a facial-landmark realization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceObservation {
    /// Eye aspect ratio (eye openness)
    pub ear: f64,
    /// Mouth aspect ratio (mouth openness)
    pub mar: f64,
    /// Horizontal nose offset relative to the inter-eye distance
    pub yaw_ratio: f64,
}

/// A facial-landmark extractor. Implementations wrap whatever landmark
/// model is available; returning `None` means no face was found in the
/// frame.
pub trait FaceLandmarkSource: Send {
    fn observe(&mut self, frame: &VideoFrame) -> Option<FaceObservation>;

    /// Clear any tracking state between trips.
    fn reset(&mut self) {}
}

/// Per-frame face signal handed to the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FaceMetrics {
    pub ear: f64,
    pub mar: f64,
    pub yaw_ratio: f64,
    /// `ear < 0.20`
    pub eyes_closed: bool,
    pub fatigue_active: bool,
    pub distracted_active: bool,
    pub fatigue_conf: f64,
    pub distracted_conf: f64,
}

const EAR_CLOSED: f64 = 0.20;
const MAR_YAWN: f64 = 0.65;
const YAW_LOOK_AWAY: f64 = 0.30;

/// Stateful fatigue/distraction monitor over a landmark source.
///
/// Fatigue latches when eyes have been closed for more than 2 s of frames
/// or a yawn has been held for more than 1.5 s; distraction latches when
/// the gaze has been away for more than 1.2 s. Counters are in sampled
/// frames, so thresholds scale with the configured fps.
pub struct DriverFaceMonitor {
    fps: f64,
    closed_frames: u32,
    yawn_frames: u32,
    look_away_frames: u32,
    source: Option<Box<dyn FaceLandmarkSource>>,
    limitations: Vec<String>,
}

impl DriverFaceMonitor {
    /// Create a monitor over the given landmark source. Passing `None`
    /// disables face-derived events and records a limitation.
    pub fn new(fps: f64, source: Option<Box<dyn FaceLandmarkSource>>) -> Self {
        let mut limitations = Vec::new();
        if source.is_none() {
            limitations.push(
                "Face landmark model unavailable: fatigue and distraction reliability reduced."
                    .to_string(),
            );
        }
        Self {
            fps: fps.max(1.0),
            closed_frames: 0,
            yawn_frames: 0,
            look_away_frames: 0,
            source,
            limitations,
        }
    }

    /// Limitation strings collected at construction.
    pub fn limitations(&self) -> &[String] {
        &self.limitations
    }

    /// Reset per-trip state, keeping the source.
    pub fn reset(&mut self, fps: f64) {
        self.fps = fps.max(1.0);
        self.closed_frames = 0;
        self.yawn_frames = 0;
        self.look_away_frames = 0;
        if let Some(source) = self.source.as_mut() {
            source.reset();
        }
    }

    /// Process one cabin frame.
    pub fn process(&mut self, frame: &VideoFrame) -> FaceMetrics {
        let observation = match self.source.as_mut().and_then(|s| s.observe(frame)) {
            Some(obs) => obs,
            None => return FaceMetrics::default(),
        };
        self.apply(observation)
    }

    /// Fold one observation into the latches. Split from [`process`] so the
    /// latch behavior is testable without frames.
    pub fn apply(&mut self, obs: FaceObservation) -> FaceMetrics {
        let eyes_closed = obs.ear < EAR_CLOSED;

        if eyes_closed {
            self.closed_frames += 1;
        } else {
            self.closed_frames = 0;
        }

        if obs.mar > MAR_YAWN {
            self.yawn_frames += 1;
        } else {
            self.yawn_frames = 0;
        }

        if obs.yaw_ratio > YAW_LOOK_AWAY {
            self.look_away_frames += 1;
        } else {
            self.look_away_frames = 0;
        }

        let fatigue_active = self.closed_frames as f64 > 2.0 * self.fps
            || self.yawn_frames as f64 > 1.5 * self.fps;
        let fatigue_conf = if fatigue_active {
            ((0.24 - obs.ear) * 6.0).max((obs.mar - 0.55) * 2.0).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let distracted_active = self.look_away_frames as f64 > 1.2 * self.fps;
        let distracted_conf = if distracted_active {
            ((obs.yaw_ratio - 0.20) * 3.0).clamp(0.0, 1.0)
        } else {
            0.0
        };

        if fatigue_active || distracted_active {
            debug!(
                closed_frames = self.closed_frames,
                yawn_frames = self.yawn_frames,
                look_away_frames = self.look_away_frames,
                "Face latch active"
            );
        }

        FaceMetrics {
            ear: obs.ear,
            mar: obs.mar,
            yaw_ratio: obs.yaw_ratio,
            eyes_closed,
            fatigue_active,
            distracted_active,
            fatigue_conf,
            distracted_conf,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_eyes() -> FaceObservation {
        FaceObservation {
            ear: 0.30,
            mar: 0.20,
            yaw_ratio: 0.05,
        }
    }

    fn closed_eyes() -> FaceObservation {
        FaceObservation {
            ear: 0.10,
            mar: 0.20,
            yaw_ratio: 0.05,
        }
    }

    #[test]
    fn test_eyes_closed_threshold() {
        let mut monitor = DriverFaceMonitor::new(10.0, None);
        assert!(monitor.apply(closed_eyes()).eyes_closed);
        assert!(!monitor.apply(open_eyes()).eyes_closed);

        let borderline = FaceObservation {
            ear: 0.20,
            ..open_eyes()
        };
        assert!(!monitor.apply(borderline).eyes_closed);
    }

    #[test]
    fn test_fatigue_latches_after_two_seconds_closed() {
        let mut monitor = DriverFaceMonitor::new(10.0, None);

        // 20 frames at 10 fps = exactly 2 s: strictly-greater, so not yet
        for _ in 0..20 {
            assert!(!monitor.apply(closed_eyes()).fatigue_active);
        }
        let metrics = monitor.apply(closed_eyes());
        assert!(metrics.fatigue_active);
        assert!(metrics.fatigue_conf > 0.0);
    }

    #[test]
    fn test_yawn_latches_fatigue() {
        let mut monitor = DriverFaceMonitor::new(10.0, None);
        let yawning = FaceObservation {
            ear: 0.30,
            mar: 0.80,
            yaw_ratio: 0.05,
        };

        for _ in 0..15 {
            assert!(!monitor.apply(yawning).fatigue_active);
        }
        let metrics = monitor.apply(yawning);
        assert!(metrics.fatigue_active);
        // conf = (0.80 - 0.55) * 2 = 0.5
        assert!((metrics.fatigue_conf - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_open_frame_resets_closed_streak() {
        let mut monitor = DriverFaceMonitor::new(10.0, None);
        for _ in 0..15 {
            monitor.apply(closed_eyes());
        }
        monitor.apply(open_eyes());
        for _ in 0..15 {
            assert!(!monitor.apply(closed_eyes()).fatigue_active);
        }
    }

    #[test]
    fn test_distraction_latch_and_confidence() {
        let mut monitor = DriverFaceMonitor::new(10.0, None);
        let looking_away = FaceObservation {
            ear: 0.30,
            mar: 0.20,
            yaw_ratio: 0.50,
        };

        for _ in 0..12 {
            assert!(!monitor.apply(looking_away).distracted_active);
        }
        let metrics = monitor.apply(looking_away);
        assert!(metrics.distracted_active);
        // conf = (0.50 - 0.20) * 3 = 0.9
        assert!((metrics.distracted_conf - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_missing_source_reports_limitation() {
        let monitor = DriverFaceMonitor::new(10.0, None);
        assert_eq!(monitor.limitations().len(), 1);
    }
}
