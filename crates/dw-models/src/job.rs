//! Background job descriptors for the in-process registry.

use std::fmt;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job state in the registry.
///
/// Transitions are `Queued → Running → {Completed, Failed, Cancelled}`;
/// cancellation may also hit a job that is still queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Waiting for a worker task
    #[default]
    Queued,
    /// Being processed
    Running,
    /// Finished successfully
    Completed,
    /// Finished with an error
    Failed,
    /// Cancel requested and honored
    Cancelled,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Cancelled
        )
    }
}

/// A background job descriptor.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,

    /// Trip this job analyzes
    pub trip_id: String,

    /// Job state
    #[serde(default)]
    pub state: JobState,

    /// Progress (0-100)
    #[serde(default)]
    pub progress: f64,

    /// Human-readable status line
    #[serde(default)]
    pub message: String,

    /// Error message (if failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Started at timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// Finished at timestamp (terminal states only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,

    /// Id of the job this one retries, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_of: Option<JobId>,
}

impl Job {
    /// Create a new queued job for a trip.
    pub fn new(trip_id: impl Into<String>) -> Self {
        Self {
            id: JobId::new(),
            trip_id: trip_id.into(),
            state: JobState::Queued,
            progress: 0.0,
            message: "Queued".to_string(),
            error: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            retry_of: None,
        }
    }

    /// Fresh descriptor retrying this job; the original stays terminal.
    pub fn retry(&self) -> Self {
        let mut job = Self::new(self.trip_id.clone());
        job.retry_of = Some(self.id.clone());
        job
    }

    /// Start processing the job.
    pub fn start(mut self) -> Self {
        self.state = JobState::Running;
        self.started_at = Some(Utc::now());
        self
    }

    /// Mark job as completed.
    pub fn complete(mut self) -> Self {
        self.state = JobState::Completed;
        self.finished_at = Some(Utc::now());
        self.progress = 100.0;
        self
    }

    /// Mark job as failed.
    pub fn fail(mut self, error: impl Into<String>) -> Self {
        self.state = JobState::Failed;
        self.error = Some(error.into());
        self.finished_at = Some(Utc::now());
        self.progress = 100.0;
        self
    }

    /// Mark job as cancelled.
    pub fn cancel(mut self) -> Self {
        self.state = JobState::Cancelled;
        self.finished_at = Some(Utc::now());
        self
    }

    /// Update progress and message.
    pub fn with_progress(mut self, progress: f64, message: impl Into<String>) -> Self {
        self.progress = progress.clamp(0.0, 100.0);
        self.message = message.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_creation() {
        let job = Job::new("trip-42");
        assert_eq!(job.state, JobState::Queued);
        assert_eq!(job.trip_id, "trip-42");
        assert!(!job.state.is_terminal());
    }

    #[test]
    fn test_job_state_transitions() {
        let job = Job::new("trip-42").start();
        assert_eq!(job.state, JobState::Running);
        assert!(job.started_at.is_some());

        let done = job.complete();
        assert_eq!(done.state, JobState::Completed);
        assert_eq!(done.progress, 100.0);
        assert!(done.state.is_terminal());
    }

    #[test]
    fn test_retry_gets_fresh_id() {
        let original = Job::new("trip-42").start().fail("decode error");
        let retried = original.retry();

        assert_ne!(retried.id, original.id);
        assert_eq!(retried.retry_of, Some(original.id));
        assert_eq!(retried.state, JobState::Queued);
        assert_eq!(original.state, JobState::Failed);
    }

    #[test]
    fn test_progress_is_clamped() {
        let job = Job::new("trip-42").with_progress(140.0, "over");
        assert_eq!(job.progress, 100.0);
    }
}
