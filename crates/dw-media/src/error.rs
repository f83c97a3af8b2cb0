//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while driving FFmpeg/FFprobe.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Video unreadable: {path}: {detail}")]
    Unreadable { path: PathBuf, detail: String },

    #[error("Invalid video file: {0}")]
    InvalidVideo(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create an unreadable-video error.
    pub fn unreadable(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        Self::Unreadable {
            path: path.into(),
            detail: detail.into(),
        }
    }

    /// True when the clip should be skipped rather than failing the trip.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            MediaError::Unreadable { .. }
                | MediaError::InvalidVideo(_)
                | MediaError::FileNotFound(_)
        )
    }
}
