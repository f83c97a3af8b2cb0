//! Per-frame signal providers for the DriveWatch analysis engine.
//!
//! Each provider is a stateful per-trip object created with a target sample
//! rate. The engine only sees the signal contracts; which library (or
//! heuristic) produced a signal is invisible past this crate.
//!
//! - [`DriverFaceMonitor`] folds raw landmark observations into EAR/MAR/yaw
//!   metrics with fatigue and distraction latches.
//! - [`LaneMonitor`] sustains/decays a lane-offset counter into a deviation
//!   signal.
//! - [`ObjectDetector`] realizations produce class-id boxes; [`derive_scene`]
//!   turns them into phone / obstruction / tailgating readings.
//! - [`SeatbeltDetector`] realizations report a missing-belt signal with the
//!   conservative prior used when no dedicated model is available.

pub mod face;
pub mod lane;
pub mod objects;
pub mod scene;
pub mod seatbelt;

pub use face::{DriverFaceMonitor, FaceLandmarkSource, FaceMetrics, FaceObservation};
pub use lane::{EdgeLaneEstimator, LaneEstimator, LaneMonitor, LaneReading};
pub use objects::{ObjectDetection, ObjectDetector, UnavailableObjectDetector};
pub use scene::{derive_scene, SceneReading, PHONE_CLASS, VEHICLE_CLASSES};
pub use seatbelt::{HeuristicSeatbeltDetector, SeatbeltDetector, SeatbeltReading};
