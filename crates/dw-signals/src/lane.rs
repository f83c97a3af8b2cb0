//! Lane deviation signal.

use dw_media::VideoFrame;

/// Estimates the lateral lane offset for one frame.
///
/// Returns the offset ratio (|vehicle center − lane center| / frame width),
/// or `None` when no lane evidence is visible.
pub trait LaneEstimator: Send {
    fn estimate(&mut self, frame: &VideoFrame) -> Option<f64>;

    fn reset(&mut self) {}
}

/// Per-frame lane signal handed to the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LaneReading {
    pub deviated: bool,
    pub confidence: f64,
    pub offset_ratio: f64,
}

const OFFSET_DEVIATION: f64 = 0.12;

/// Sustains/decays an offset counter into a deviation signal.
///
/// The counter rises while the offset ratio stays above 0.12 and drains one
/// frame per clean frame; deviation is reported once it exceeds one second
/// of sampled frames.
pub struct LaneMonitor {
    fps: f64,
    offset_frames: i32,
    estimator: Box<dyn LaneEstimator>,
}

impl LaneMonitor {
    pub fn new(fps: f64, estimator: Box<dyn LaneEstimator>) -> Self {
        Self {
            fps: fps.max(1.0),
            offset_frames: 0,
            estimator,
        }
    }

    pub fn reset(&mut self, fps: f64) {
        self.fps = fps.max(1.0);
        self.offset_frames = 0;
        self.estimator.reset();
    }

    /// Process one front frame.
    pub fn process(&mut self, frame: &VideoFrame) -> LaneReading {
        let offset_ratio = match self.estimator.estimate(frame) {
            Some(ratio) => ratio,
            None => {
                self.offset_frames = (self.offset_frames - 1).max(0);
                return LaneReading::default();
            }
        };
        self.apply(offset_ratio)
    }

    /// Fold one offset observation into the counter.
    pub fn apply(&mut self, offset_ratio: f64) -> LaneReading {
        if offset_ratio > OFFSET_DEVIATION {
            self.offset_frames += 1;
        } else {
            self.offset_frames = (self.offset_frames - 1).max(0);
        }

        let deviated = self.offset_frames as f64 > self.fps;
        let confidence = if deviated {
            ((offset_ratio - 0.07) * 6.0).clamp(0.0, 1.0)
        } else {
            0.0
        };

        LaneReading {
            deviated,
            confidence,
            offset_ratio,
        }
    }
}

/// Cheap luma-gradient lane estimator.
///
/// Looks at the lower part of the frame, collects strong horizontal
/// gradients on each side of the image and takes their midpoint as the lane
/// center. A dedicated lane model can replace this through the
/// [`LaneEstimator`] trait.
#[derive(Debug)]
pub struct EdgeLaneEstimator {
    gradient_threshold: i16,
}

impl Default for EdgeLaneEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl EdgeLaneEstimator {
    pub fn new() -> Self {
        Self {
            gradient_threshold: 40,
        }
    }
}

const MIN_EDGE_PIXELS: usize = 40;

impl LaneEstimator for EdgeLaneEstimator {
    fn estimate(&mut self, frame: &VideoFrame) -> Option<f64> {
        let w = frame.width as usize;
        let h = frame.height as usize;
        if w < 8 || h < 8 {
            return None;
        }

        let roi_top = (h as f64 * 0.55) as usize;
        let mid = w / 2;
        let mut left = (0usize, 0u64);
        let mut right = (0usize, 0u64);

        for y in roi_top..h {
            let row = &frame.data[y * w..(y + 1) * w];
            for x in 1..w - 1 {
                let grad = (row[x + 1] as i16 - row[x - 1] as i16).abs();
                if grad > self.gradient_threshold {
                    if x < mid {
                        left.0 += 1;
                        left.1 += x as u64;
                    } else {
                        right.0 += 1;
                        right.1 += x as u64;
                    }
                }
            }
        }

        if left.0 < MIN_EDGE_PIXELS || right.0 < MIN_EDGE_PIXELS {
            return None;
        }

        let left_x = left.1 as f64 / left.0 as f64;
        let right_x = right.1 as f64 / right.0 as f64;
        let lane_center = (left_x + right_x) / 2.0;
        let car_center = w as f64 / 2.0;
        Some((car_center - lane_center).abs() / w as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Scripted(Vec<Option<f64>>, usize);

    impl LaneEstimator for Scripted {
        fn estimate(&mut self, _frame: &VideoFrame) -> Option<f64> {
            let v = self.0.get(self.1).copied().flatten();
            self.1 += 1;
            v
        }
    }

    fn monitor(fps: f64) -> LaneMonitor {
        LaneMonitor::new(fps, Box::new(Scripted(vec![], 0)))
    }

    #[test]
    fn test_deviation_requires_sustained_offset() {
        let mut lane = monitor(10.0);

        // 10 frames at 10 fps is exactly one second: strictly-greater gate
        for _ in 0..10 {
            assert!(!lane.apply(0.20).deviated);
        }
        let reading = lane.apply(0.20);
        assert!(reading.deviated);
        // conf = (0.20 - 0.07) * 6 = 0.78
        assert!((reading.confidence - 0.78).abs() < 1e-9);
        assert_eq!(reading.offset_ratio, 0.20);
    }

    #[test]
    fn test_clean_frames_drain_counter() {
        let mut lane = monitor(10.0);
        for _ in 0..8 {
            lane.apply(0.20);
        }
        for _ in 0..8 {
            assert!(!lane.apply(0.05).deviated);
        }
        // Counter fully drained; a fresh offset must re-accumulate
        for _ in 0..10 {
            assert!(!lane.apply(0.20).deviated);
        }
    }

    #[test]
    fn test_lane_center_offset_estimation() {
        // Bright vertical stripes at 1/4 and 3/4 of the width produce a
        // centered lane: offset ratio near zero.
        let w = 64u32;
        let h = 64u32;
        let mut data = vec![0u8; (w * h) as usize];
        for y in 0..h {
            for x in [w / 4, 3 * w / 4] {
                for dx in 0..2 {
                    data[(y * w + x + dx) as usize] = 255;
                }
            }
        }
        let frame = VideoFrame {
            index: 0,
            width: w,
            height: h,
            data,
        };

        let mut estimator = EdgeLaneEstimator::new();
        let ratio = estimator.estimate(&frame).expect("edges visible");
        assert!(ratio < 0.05, "expected centered lane, got {ratio}");
    }

    #[test]
    fn test_blank_frame_gives_no_estimate() {
        let frame = VideoFrame {
            index: 0,
            width: 64,
            height: 64,
            data: vec![128; 64 * 64],
        };
        let mut estimator = EdgeLaneEstimator::new();
        assert!(estimator.estimate(&frame).is_none());
    }
}
