//! Evaluation error types.

use std::path::PathBuf;
use thiserror::Error;

pub type EvalResult<T> = Result<T, EvalError>;

#[derive(Debug, Error)]
pub enum EvalError {
    /// A required input file or directory does not exist.
    #[error("Input missing: {0}")]
    InputMissing(PathBuf),

    /// An input file exists but is not valid JSON of the expected shape.
    #[error("Malformed input {path}: {detail}")]
    Malformed { path: PathBuf, detail: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EvalError {
    pub fn malformed(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        Self::Malformed {
            path: path.into(),
            detail: detail.into(),
        }
    }
}
