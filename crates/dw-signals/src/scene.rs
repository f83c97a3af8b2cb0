//! Scene derivation: phone presence, lead distance, obstruction and
//! tailgating from class-id boxes.

use crate::objects::ObjectDetection;

/// COCO classes treated as vehicles.
pub const VEHICLE_CLASSES: [u32; 4] = [2, 3, 5, 7];

/// COCO class id for a mobile phone.
pub const PHONE_CLASS: u32 = 67;

/// Assumed lead-vehicle width (m) times an assumed focal length (px),
/// used for the monocular distance estimate `1.8 * 850 / bbox_width`.
const VEHICLE_WIDTH_M: f64 = 1.8;
const FOCAL_LENGTH_PX: f64 = 850.0;

const OBSTRUCTION_AREA_RATIO: f64 = 0.13;
const TAILGATING_DISTANCE_M: f64 = 10.0;

/// Derived forward-scene signals for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SceneReading {
    pub phone: bool,
    pub phone_conf: f64,
    pub obstruction: bool,
    pub obstruction_conf: f64,
    pub tailgating: bool,
    pub tailgating_conf: f64,
    /// Estimated distance to the closest lead-lane vehicle, meters
    /// (0 when no lead vehicle is visible)
    pub lead_distance_m: f64,
}

/// Fold object detections into scene signals.
///
/// A phone counts when its top-left corner falls in the driver ROI
/// (left 55% x top 75% of the frame). Vehicles count as lead vehicles when
/// horizontally inside the 30-70% band and extending below 35% height;
/// the closest one sets the lead distance.
pub fn derive_scene(detections: &[ObjectDetection], width: u32, height: u32) -> SceneReading {
    let w = width as f64;
    let h = height as f64;
    let driver_roi = (w * 0.55, h * 0.75);
    let lane_roi = (w * 0.30, h * 0.35, w * 0.70);

    let mut reading = SceneReading::default();
    let mut lead_distance = f64::INFINITY;

    for det in detections {
        let (x1, y1, x2, y2) = det.bbox;
        let area_ratio = det.area() / (w * h);

        if det.class_id == PHONE_CLASS && x1 < driver_roi.0 && y1 < driver_roi.1 {
            reading.phone = true;
            reading.phone_conf = reading.phone_conf.max(det.confidence);
        }

        let in_lane = x1 > lane_roi.0 && x2 < lane_roi.2 && y2 > lane_roi.1;
        if VEHICLE_CLASSES.contains(&det.class_id) && in_lane {
            let distance = VEHICLE_WIDTH_M * FOCAL_LENGTH_PX / det.width();
            lead_distance = lead_distance.min(distance);

            if area_ratio > OBSTRUCTION_AREA_RATIO {
                reading.obstruction = true;
                reading.obstruction_conf =
                    reading.obstruction_conf.max((area_ratio * 3.0).min(1.0));
            }
            if distance < TAILGATING_DISTANCE_M {
                reading.tailgating = true;
                reading.tailgating_conf = reading
                    .tailgating_conf
                    .max(((TAILGATING_DISTANCE_M - distance) / 8.0).min(1.0));
            }
        }
    }

    reading.lead_distance_m = if lead_distance.is_finite() {
        lead_distance
    } else {
        0.0
    };
    reading
}

#[cfg(test)]
mod tests {
    use super::*;

    const W: u32 = 1280;
    const H: u32 = 720;

    fn vehicle(x1: f64, y1: f64, x2: f64, y2: f64, conf: f64) -> ObjectDetection {
        ObjectDetection {
            class_id: 2,
            confidence: conf,
            bbox: (x1, y1, x2, y2),
        }
    }

    #[test]
    fn test_empty_scene() {
        let reading = derive_scene(&[], W, H);
        assert!(!reading.phone && !reading.obstruction && !reading.tailgating);
        assert_eq!(reading.lead_distance_m, 0.0);
    }

    #[test]
    fn test_phone_in_driver_roi() {
        let phone = ObjectDetection {
            class_id: PHONE_CLASS,
            confidence: 0.7,
            bbox: (100.0, 200.0, 160.0, 280.0),
        };
        let reading = derive_scene(&[phone], W, H);
        assert!(reading.phone);
        assert_eq!(reading.phone_conf, 0.7);
    }

    #[test]
    fn test_phone_outside_driver_roi_ignored() {
        // Top-left past 55% of the width
        let phone = ObjectDetection {
            class_id: PHONE_CLASS,
            confidence: 0.7,
            bbox: (900.0, 200.0, 960.0, 280.0),
        };
        let reading = derive_scene(&[phone], W, H);
        assert!(!reading.phone);
    }

    #[test]
    fn test_tailgating_close_vehicle() {
        // Width 400 px -> distance = 1.8 * 850 / 400 = 3.825 m
        let det = vehicle(440.0, 300.0, 840.0, 700.0, 0.9);
        let reading = derive_scene(&[det], W, H);
        assert!(reading.tailgating);
        assert!((reading.lead_distance_m - 3.825).abs() < 1e-9);
        // conf = (10 - 3.825) / 8 = 0.771875
        assert!((reading.tailgating_conf - 0.771_875).abs() < 1e-9);
    }

    #[test]
    fn test_obstruction_by_area() {
        // 400 x 400 box = 160k px over 921.6k px = 0.1736 area ratio
        let det = vehicle(440.0, 300.0, 840.0, 700.0, 0.9);
        let reading = derive_scene(&[det], W, H);
        assert!(reading.obstruction);
        let expected = ((400.0 * 400.0) / (1280.0 * 720.0) * 3.0_f64).min(1.0);
        assert!((reading.obstruction_conf - expected).abs() < 1e-9);
    }

    #[test]
    fn test_vehicle_outside_lane_band_ignored() {
        // Left edge before 30% of the width: not a lead vehicle
        let det = vehicle(100.0, 300.0, 500.0, 700.0, 0.9);
        let reading = derive_scene(&[det], W, H);
        assert!(!reading.tailgating && !reading.obstruction);
        assert_eq!(reading.lead_distance_m, 0.0);
    }

    #[test]
    fn test_closest_lead_vehicle_wins() {
        let near = vehicle(440.0, 300.0, 840.0, 700.0, 0.9); // 400 px wide
        let far = vehicle(500.0, 300.0, 700.0, 700.0, 0.9); // 200 px wide
        let reading = derive_scene(&[far, near], W, H);
        assert!((reading.lead_distance_m - 3.825).abs() < 1e-9);
    }
}
