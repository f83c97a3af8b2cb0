//! Seatbelt signal.

use dw_media::VideoFrame;

/// Per-frame seatbelt signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeatbeltReading {
    pub missing: bool,
    pub confidence: f64,
}

/// A seatbelt detector realization.
pub trait SeatbeltDetector: Send {
    fn detect(&mut self, frame: &VideoFrame) -> SeatbeltReading;

    fn limitations(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Conservative prior when the frame carries no usable belt evidence:
/// assume the belt is missing at low confidence rather than silently
/// passing the check.
pub const ABSENT_SIGNAL: SeatbeltReading = SeatbeltReading {
    missing: true,
    confidence: 0.55,
};

/// Edge-orientation heuristic over the driver torso region.
///
/// A worn belt shows up as a diagonal strap crossing the torso ROI; the
/// detector counts edge pixels whose implied line slope sits in the strap
/// band and reports the belt missing when that evidence is thin. Replace
/// through [`SeatbeltDetector`] when a dedicated model is available.
#[derive(Debug)]
pub struct HeuristicSeatbeltDetector {
    gradient_threshold: i32,
}

impl Default for HeuristicSeatbeltDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl HeuristicSeatbeltDetector {
    pub fn new() -> Self {
        Self {
            gradient_threshold: 40,
        }
    }
}

impl SeatbeltDetector for HeuristicSeatbeltDetector {
    fn detect(&mut self, frame: &VideoFrame) -> SeatbeltReading {
        let w = frame.width as usize;
        let h = frame.height as usize;
        if w < 8 || h < 8 {
            return ABSENT_SIGNAL;
        }

        let (x0, x1) = ((w as f64 * 0.15) as usize, (w as f64 * 0.70) as usize);
        let (y0, y1) = ((h as f64 * 0.35) as usize, (h as f64 * 0.85) as usize);

        let mut edge_pixels = 0usize;
        let mut strap_pixels = 0usize;
        let thr_sq = self.gradient_threshold * self.gradient_threshold;

        for y in y0.max(1)..y1.min(h - 1) {
            for x in x0.max(1)..x1.min(w - 1) {
                let gx = frame.data[y * w + x + 1] as i32 - frame.data[y * w + x - 1] as i32;
                let gy = frame.data[(y + 1) * w + x] as i32 - frame.data[(y - 1) * w + x] as i32;
                if gx * gx + gy * gy <= thr_sq {
                    continue;
                }
                edge_pixels += 1;

                // Line direction is perpendicular to the gradient; a strap
                // slope in (-2.4, -0.25) maps to gx/gy in (0.25, 2.4).
                if gy != 0 {
                    let ratio = gx as f64 / gy as f64;
                    if (0.25..2.4).contains(&ratio) {
                        strap_pixels += 1;
                    }
                }
            }
        }

        if edge_pixels == 0 {
            return ABSENT_SIGNAL;
        }

        let roi_area = (x1 - x0).max(1) * (y1 - y0).max(1);
        if strap_pixels < roi_area / 400 {
            return SeatbeltReading {
                missing: true,
                confidence: 0.65,
            };
        }
        SeatbeltReading {
            missing: false,
            confidence: 0.0,
        }
    }

    fn limitations(&self) -> Vec<String> {
        vec![
            "Seatbelt detection is heuristic; use a seatbelt-specific model for production certification."
                .to_string(),
        ]
    }
}
