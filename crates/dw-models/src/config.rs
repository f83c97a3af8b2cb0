//! Analysis configuration.

/// Configuration for trip analysis.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Sampling rate used to derive per-frame cadence (frames per second)
    pub target_fps: f64,
    /// Seconds of video exported before an event center
    pub clip_pre_event_sec: f64,
    /// Seconds of video exported after an event center
    pub clip_post_event_sec: f64,
    /// Filesystem root for per-trip report directories
    pub report_dir: String,
    /// Filesystem root holding `trips/<trip_id>/{front,cabin}` uploads
    pub upload_dir: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            target_fps: 10.0,
            clip_pre_event_sec: 5.0,
            clip_post_event_sec: 5.0,
            report_dir: "reports".to_string(),
            upload_dir: "uploads".to_string(),
        }
    }
}

impl AnalysisConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            target_fps: std::env::var("DW_TARGET_FPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10.0),
            clip_pre_event_sec: std::env::var("DW_CLIP_PRE_EVENT_SEC")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5.0),
            clip_post_event_sec: std::env::var("DW_CLIP_POST_EVENT_SEC")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5.0),
            report_dir: std::env::var("DW_REPORT_DIR").unwrap_or_else(|_| "reports".to_string()),
            upload_dir: std::env::var("DW_UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string()),
        }
    }

    /// Milliseconds between sampled frames at `target_fps`.
    pub fn frame_delta_ms(&self) -> u32 {
        (1000.0 / self.target_fps.max(1.0)) as u32
    }
}
