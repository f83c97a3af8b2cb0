//! The job registry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use dw_models::{Job, JobId, JobState};
use tokio::process::Child;
use tracing::{info, warn};

use crate::error::{RegistryError, RegistryResult};

/// Shared cancellation flag observed by worker tasks at supervisory
/// checkpoints (segment boundaries for trip analysis).
pub type CancelFlag = Arc<AtomicBool>;

/// Runtime handle for a job: its cancel flag plus an optional child
/// process to terminate on cancellation.
struct JobHandle {
    cancel: CancelFlag,
    child: Option<Child>,
}

/// Both maps live behind one exclusive lock; the lock is never held
/// across blocking I/O.
#[derive(Default)]
struct Inner {
    jobs: HashMap<JobId, Job>,
    handles: HashMap<JobId, JobHandle>,
}

/// Process-wide background job registry.
///
/// Constructed explicitly (no hidden singleton) so tests can own private
/// instances; the binary creates one at the process boundary.
#[derive(Clone, Default)]
pub struct JobRegistry {
    inner: Arc<Mutex<Inner>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Submit a job for a trip; returns the descriptor and its cancel flag.
    pub fn submit(&self, trip_id: impl Into<String>) -> (Job, CancelFlag) {
        let job = Job::new(trip_id);
        let cancel: CancelFlag = Arc::new(AtomicBool::new(false));

        let mut inner = self.inner.lock().expect("registry lock");
        inner.handles.insert(
            job.id.clone(),
            JobHandle {
                cancel: Arc::clone(&cancel),
                child: None,
            },
        );
        inner.jobs.insert(job.id.clone(), job.clone());
        info!(job_id = %job.id, trip_id = %job.trip_id, "Job submitted");
        (job, cancel)
    }

    /// Attach a child process to a job so cancellation can terminate it.
    pub fn register_child(&self, id: &JobId, child: Child) -> RegistryResult<()> {
        let mut inner = self.inner.lock().expect("registry lock");
        let handle = inner
            .handles
            .get_mut(id)
            .ok_or_else(|| RegistryError::UnknownJob(id.clone()))?;
        handle.child = Some(child);
        Ok(())
    }

    pub fn get(&self, id: &JobId) -> Option<Job> {
        self.inner.lock().expect("registry lock").jobs.get(id).cloned()
    }

    /// All descriptors, newest first.
    pub fn list(&self) -> Vec<Job> {
        let inner = self.inner.lock().expect("registry lock");
        let mut jobs: Vec<Job> = inner.jobs.values().cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    fn update(&self, id: &JobId, f: impl FnOnce(Job) -> Job) -> RegistryResult<Job> {
        let mut inner = self.inner.lock().expect("registry lock");
        let job = inner
            .jobs
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownJob(id.clone()))?;
        let updated = f(job);
        inner.jobs.insert(id.clone(), updated.clone());
        Ok(updated)
    }

    pub fn mark_running(&self, id: &JobId) -> RegistryResult<Job> {
        self.update(id, Job::start)
    }

    pub fn update_progress(
        &self,
        id: &JobId,
        progress: f64,
        message: impl Into<String>,
    ) -> RegistryResult<Job> {
        let message = message.into();
        self.update(id, move |job| job.with_progress(progress, message))
    }

    /// Mark completed unless the job was cancelled in the meantime.
    pub fn complete(&self, id: &JobId) -> RegistryResult<Job> {
        self.update(id, |job| {
            if job.state == JobState::Cancelled {
                job
            } else {
                job.complete()
            }
        })
    }

    /// Mark failed unless the job was cancelled in the meantime.
    pub fn fail(&self, id: &JobId, error: impl Into<String>) -> RegistryResult<Job> {
        let error = error.into();
        self.update(id, move |job| {
            if job.state == JobState::Cancelled {
                job
            } else {
                job.fail(error)
            }
        })
    }

    /// Request cancellation. One-shot: terminal jobs are left untouched.
    ///
    /// Sets the descriptor to `cancelled`, raises the cancel flag and
    /// requests termination of a registered child process.
    pub fn cancel(&self, id: &JobId) -> RegistryResult<Job> {
        let mut inner = self.inner.lock().expect("registry lock");
        let job = inner
            .jobs
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownJob(id.clone()))?;
        if job.state.is_terminal() {
            return Err(RegistryError::AlreadyTerminal(id.clone()));
        }

        let cancelled = job.cancel();
        inner.jobs.insert(id.clone(), cancelled.clone());

        if let Some(handle) = inner.handles.get_mut(id) {
            handle.cancel.store(true, Ordering::Relaxed);
            if let Some(child) = handle.child.as_mut() {
                if let Err(e) = child.start_kill() {
                    warn!(job_id = %id, error = %e, "Failed to signal child process");
                }
            }
        }
        info!(job_id = %id, "Job cancelled");
        Ok(cancelled)
    }

    /// Retry a terminal job: submits a fresh descriptor with a new id and
    /// leaves the original in its terminal state.
    pub fn retry(&self, id: &JobId) -> RegistryResult<(Job, CancelFlag)> {
        let original = {
            let inner = self.inner.lock().expect("registry lock");
            inner
                .jobs
                .get(id)
                .cloned()
                .ok_or_else(|| RegistryError::UnknownJob(id.clone()))?
        };
        if !original.state.is_terminal() {
            return Err(RegistryError::NotTerminal(id.clone()));
        }

        let job = original.retry();
        let cancel: CancelFlag = Arc::new(AtomicBool::new(false));
        let mut inner = self.inner.lock().expect("registry lock");
        inner.handles.insert(
            job.id.clone(),
            JobHandle {
                cancel: Arc::clone(&cancel),
                child: None,
            },
        );
        inner.jobs.insert(job.id.clone(), job.clone());
        Ok((job, cancel))
    }

    /// Drop the runtime handle once a job reaches a terminal state.
    pub fn release_handle(&self, id: &JobId) {
        self.inner.lock().expect("registry lock").handles.remove(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_and_lifecycle() {
        let registry = JobRegistry::new();
        let (job, cancel) = registry.submit("trip-1");
        assert_eq!(job.state, JobState::Queued);
        assert!(!cancel.load(Ordering::Relaxed));

        registry.mark_running(&job.id).unwrap();
        registry.update_progress(&job.id, 40.0, "Analyzing").unwrap();
        let running = registry.get(&job.id).unwrap();
        assert_eq!(running.state, JobState::Running);
        assert_eq!(running.progress, 40.0);

        let done = registry.complete(&job.id).unwrap();
        assert_eq!(done.state, JobState::Completed);
        assert_eq!(done.progress, 100.0);
    }

    #[test]
    fn test_cancel_raises_flag_and_is_one_shot() {
        let registry = JobRegistry::new();
        let (job, cancel) = registry.submit("trip-1");
        registry.mark_running(&job.id).unwrap();

        let cancelled = registry.cancel(&job.id).unwrap();
        assert_eq!(cancelled.state, JobState::Cancelled);
        assert!(cancel.load(Ordering::Relaxed));

        // Second cancel hits a terminal descriptor
        assert!(matches!(
            registry.cancel(&job.id),
            Err(RegistryError::AlreadyTerminal(_))
        ));
    }

    #[test]
    fn test_completion_does_not_override_cancellation() {
        let registry = JobRegistry::new();
        let (job, _cancel) = registry.submit("trip-1");
        registry.mark_running(&job.id).unwrap();
        registry.cancel(&job.id).unwrap();

        // The worker finishes later and reports completion; the terminal
        // cancelled state wins.
        let after = registry.complete(&job.id).unwrap();
        assert_eq!(after.state, JobState::Cancelled);
    }

    #[test]
    fn test_retry_creates_fresh_descriptor() {
        let registry = JobRegistry::new();
        let (job, _) = registry.submit("trip-1");
        registry.mark_running(&job.id).unwrap();
        registry.fail(&job.id, "decode error").unwrap();

        let (retried, _) = registry.retry(&job.id).unwrap();
        assert_ne!(retried.id, job.id);
        assert_eq!(retried.retry_of, Some(job.id.clone()));
        assert_eq!(retried.state, JobState::Queued);
        assert_eq!(registry.get(&job.id).unwrap().state, JobState::Failed);
    }

    #[test]
    fn test_retry_requires_terminal_state() {
        let registry = JobRegistry::new();
        let (job, _) = registry.submit("trip-1");
        assert!(registry.retry(&job.id).is_err());
    }

    #[test]
    fn test_unknown_job() {
        let registry = JobRegistry::new();
        assert!(registry.get(&JobId::new()).is_none());
        assert!(matches!(
            registry.cancel(&JobId::new()),
            Err(RegistryError::UnknownJob(_))
        ));
    }
}
