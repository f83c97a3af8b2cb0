//! Per-trip analysis pipeline.
//!
//! One trip runs as a single sequential task: every frame update mutates
//! the debouncer and the PERCLOS window, so frames are never processed
//! concurrently. Multiple trips may run in parallel tasks, each owning its
//! own providers and debouncer.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dw_media::FrameStream;
use dw_models::{AnalysisConfig, Event, Stream, TripInfo};
use dw_signals::{
    derive_scene, DriverFaceMonitor, EdgeLaneEstimator, HeuristicSeatbeltDetector, LaneMonitor,
    ObjectDetector, SeatbeltDetector, UnavailableObjectDetector,
};
use tracing::{info, warn};

use crate::debounce::{Debouncer, EmitContext};
use crate::error::{AnalysisError, AnalysisResult};
use crate::interpreter::SignalInterpreter;
use crate::report::{build_failed_report, build_report, write_report};
use crate::scorer::score_trip;
use crate::segment::TripSegments;

/// The object detector runs on every N-th sampled frame; other frames
/// carry no scene activations.
const DETECT_EVERY_N: u64 = 2;

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// The per-trip signal provider set.
pub struct SignalProviders {
    pub face: DriverFaceMonitor,
    pub lane: LaneMonitor,
    pub seatbelt: Box<dyn SeatbeltDetector>,
    pub objects: Box<dyn ObjectDetector>,
}

impl SignalProviders {
    /// Built-in heuristic set: edge-based lane estimation, heuristic
    /// seatbelt check, no face landmarks and no object model. Dependent
    /// events are disabled and surface in `limitations()`.
    pub fn heuristic(fps: f64) -> Self {
        Self {
            face: DriverFaceMonitor::new(fps, None),
            lane: LaneMonitor::new(fps, Box::new(EdgeLaneEstimator::new())),
            seatbelt: Box::new(HeuristicSeatbeltDetector::new()),
            objects: Box::new(UnavailableObjectDetector),
        }
    }

    /// Collected limitation strings from all providers.
    pub fn limitations(&self) -> Vec<String> {
        let mut notes = self.face.limitations().to_vec();
        notes.extend(self.seatbelt.limitations());
        notes.extend(self.objects.limitations());
        notes
    }
}

/// Analyzes one trip's segments into a scored report.
pub struct TripAnalyzer {
    config: AnalysisConfig,
    providers: SignalProviders,
    cancel: Arc<AtomicBool>,
}

impl TripAnalyzer {
    pub fn new(config: AnalysisConfig, providers: SignalProviders) -> Self {
        Self {
            config,
            providers,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share a cancel flag; cancellation is honored at segment boundaries.
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run the analysis and write the per-trip report.
    ///
    /// `progress` receives `(percent, message)` updates along the way.
    pub async fn run(
        &mut self,
        trip_id: &str,
        progress: &mut dyn FnMut(f64, &str),
    ) -> AnalysisResult<dw_models::TripReport> {
        let trip_root = Path::new(&self.config.upload_dir).join(trip_id);
        progress(1.0, "Assembling trip segments");

        let segments = TripSegments::assemble(&trip_root)?;
        let merged = segments.merged();
        let has_cabin = segments.has_cabin();
        let delta_ms = self.config.frame_delta_ms();
        let limitations = self.providers.limitations();

        let mut debouncer = Debouncer::new();
        let mut interpreter = SignalInterpreter::new();
        let mut events: Vec<Event> = Vec::new();
        let mut total_duration = 0.0f64;

        for (idx, segment) in merged.iter().enumerate() {
            if self.cancel.load(Ordering::Relaxed) {
                return Err(AnalysisError::Cancelled);
            }

            let clip_name = segment.clip_name();
            progress(
                5.0 + ((idx + 1) as f64 / merged.len() as f64) * 75.0,
                &format!("Analyzing {clip_name} ({}/{})", idx + 1, merged.len()),
            );

            let mut stream = match FrameStream::open(&segment.path, self.config.target_fps).await
            {
                Ok(s) => s,
                Err(e) if e.is_recoverable() => {
                    warn!(clip = %clip_name, error = %e, "Skipping unreadable clip");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            total_duration += stream.info().duration;

            let is_cabin = segment.stream == Stream::Cabin;
            let drives_face = is_cabin || !has_cabin;

            loop {
                let frame = match stream.next_frame().await {
                    Ok(Some(frame)) => frame,
                    Ok(None) => break,
                    Err(e) if e.is_recoverable() => {
                        warn!(clip = %clip_name, error = %e, "Decode stopped mid-clip");
                        break;
                    }
                    Err(e) => return Err(e.into()),
                };
                let ts_local_ms = (frame.index * delta_ms as u64) as i64;
                let mut ts_global_sec =
                    segment.start_seconds_of_day as f64 + ts_local_ms as f64 / 1000.0;
                if is_cabin {
                    ts_global_sec -= segments.sync_offset_seconds;
                }
                let now_ms = (ts_global_sec * 1000.0) as i64;

                let detections = if frame.index % DETECT_EVERY_N == 0 {
                    self.providers.objects.detect(&frame)
                } else {
                    Vec::new()
                };
                let scene = derive_scene(&detections, frame.width, frame.height);

                let mut activations = Vec::new();
                if drives_face {
                    let face = self.providers.face.process(&frame);
                    let seatbelt = self.providers.seatbelt.detect(&frame);
                    activations.extend(interpreter.cabin_activations(
                        now_ms, delta_ms, &face, seatbelt, &scene,
                    ));
                }
                if !is_cabin {
                    let lane = self.providers.lane.process(&frame);
                    activations.extend(interpreter.front_activations(&lane, &scene));
                }

                let ctx = EmitContext {
                    stream: segment.stream,
                    clip_name: clip_name.clone(),
                    video_path: Some(segment.path.clone()),
                    local_ts_sec: round3(ts_local_ms as f64 / 1000.0),
                };
                for act in activations {
                    if let Some(event) = debouncer.update(
                        act.event_type,
                        act.active,
                        act.conf,
                        now_ms,
                        delta_ms,
                        act.metadata,
                        &ctx,
                    ) {
                        events.push(event);
                    }
                }
            }
        }

        progress(90.0, "Generating reports");

        let report_root = Path::new(&self.config.report_dir).join(trip_id);
        self.export_event_media(&report_root, &events).await;

        let scores = score_trip(&events, total_duration);
        let trip = TripInfo {
            driver_id: None,
            vehicle_id: None,
            duration_seconds: round2(total_duration),
            sync_offset_seconds: segments.sync_offset_seconds,
            day_folder: None,
        };
        let report = build_report(trip_id, trip, scores, events, limitations);
        write_report(Path::new(&self.config.report_dir), &report)?;

        progress(100.0, "Analysis complete");
        info!(
            trip_id,
            events = report.events.len(),
            overall = report.scores.overall_score,
            "Trip analysis complete"
        );
        Ok(report)
    }

    /// Export a snapshot and a short clip per event. Best-effort: export
    /// failures never fail the trip.
    async fn export_event_media(&self, report_root: &Path, events: &[Event]) {
        for (idx, event) in events.iter().enumerate() {
            let Some(video_path) = event.video_path.as_ref() else {
                continue;
            };
            let ordinal = idx + 1;
            let local_center = event.local_ts_sec.max(0.0);

            let snap = report_root.join("snapshots").join(format!("event_{ordinal:04}.jpg"));
            if let Err(e) = dw_media::export_snapshot(video_path, local_center, &snap).await {
                warn!(event = %event.event_type, error = %e, "Snapshot export failed");
            }

            let clip = report_root.join("clips").join(format!("event_{ordinal:04}.mp4"));
            if let Err(e) = dw_media::export_clip(
                video_path,
                local_center - self.config.clip_pre_event_sec,
                local_center + self.config.clip_post_event_sec,
                &clip,
            )
            .await
            {
                warn!(event = %event.event_type, error = %e, "Clip export failed");
            }
        }
    }
}

/// Analyze one trip with the built-in heuristic providers.
///
/// On failure a `failed` report (error message set) is still written under
/// the report dir before the error propagates.
pub async fn analyze_trip(
    config: &AnalysisConfig,
    trip_id: &str,
    progress: &mut dyn FnMut(f64, &str),
) -> AnalysisResult<dw_models::TripReport> {
    let providers = SignalProviders::heuristic(config.target_fps);
    let mut analyzer = TripAnalyzer::new(config.clone(), providers);

    match analyzer.run(trip_id, progress).await {
        Ok(report) => Ok(report),
        Err(e) => {
            let report = build_failed_report(trip_id, TripInfo::default(), &e.to_string());
            if let Err(write_err) = write_report(Path::new(&config.report_dir), &report) {
                warn!(trip_id, error = %write_err, "Failed to write failure report");
            }
            progress(100.0, "Trip processing failed");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dw_models::{TripReport, TripStatus};

    fn config(tmp: &tempfile::TempDir) -> AnalysisConfig {
        AnalysisConfig {
            upload_dir: tmp.path().join("uploads").display().to_string(),
            report_dir: tmp.path().join("reports").display().to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_empty_trip_writes_failed_report() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let config = config(&tmp);
        std::fs::create_dir_all(Path::new(&config.upload_dir).join("trip-1")).unwrap();

        let mut updates = Vec::new();
        let err = analyze_trip(&config, "trip-1", &mut |p, m| {
            updates.push((p, m.to_string()));
        })
        .await
        .unwrap_err();
        assert!(matches!(err, AnalysisError::NoSegments));

        let report_path = Path::new(&config.report_dir).join("trip-1").join("report.json");
        let report: TripReport =
            serde_json::from_str(&std::fs::read_to_string(report_path).unwrap()).unwrap();
        assert_eq!(report.status, TripStatus::Failed);
        assert_eq!(report.error.as_deref(), Some("No video segments found"));
        assert_eq!(updates.last().map(|(p, _)| *p), Some(100.0));
    }

    #[tokio::test]
    async fn test_cancellation_checked_at_segment_boundary() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let config = config(&tmp);
        let front = Path::new(&config.upload_dir).join("trip-2").join("front");
        std::fs::create_dir_all(&front).unwrap();
        std::fs::write(front.join("120000_001_001_AA.mp4"), b"stub").unwrap();

        let cancel = Arc::new(AtomicBool::new(true));
        let mut analyzer =
            TripAnalyzer::new(config.clone(), SignalProviders::heuristic(10.0))
                .with_cancel_flag(cancel);
        let err = analyzer.run("trip-2", &mut |_, _| {}).await.unwrap_err();
        assert!(matches!(err, AnalysisError::Cancelled));
    }

    #[tokio::test]
    async fn test_unreadable_clip_is_skipped() {
        // A stub file is not decodable; the pipeline should skip it and
        // produce an empty (but successful) report.
        let tmp = tempfile::tempdir().expect("tempdir");
        let config = config(&tmp);
        let front = Path::new(&config.upload_dir).join("trip-3").join("front");
        std::fs::create_dir_all(&front).unwrap();
        std::fs::write(front.join("120000_001_001_AA.mp4"), b"not a real mp4").unwrap();

        let mut analyzer = TripAnalyzer::new(config.clone(), SignalProviders::heuristic(10.0));
        match analyzer.run("trip-3", &mut |_, _| {}).await {
            Ok(report) => {
                assert!(report.events.is_empty());
                assert_eq!(report.status, TripStatus::Done);
            }
            // Without ffprobe on PATH the decode preflight fails instead;
            // both outcomes leave the engine intact.
            Err(AnalysisError::Media(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
}
