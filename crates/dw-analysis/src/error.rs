//! Analysis error types.

use thiserror::Error;

pub type AnalysisResult<T> = Result<T, AnalysisError>;

#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Both stream folders are empty; fatal for the trip.
    #[error("No video segments found")]
    NoSegments,

    /// Cancellation observed at a segment boundary.
    #[error("Trip analysis cancelled")]
    Cancelled,

    #[error("Media error: {0}")]
    Media(#[from] dw_media::MediaError),

    #[error("Report write failed: {0}")]
    ReportWrite(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
