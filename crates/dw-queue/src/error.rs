//! Registry error types.

use dw_models::JobId;
use thiserror::Error;

pub type RegistryResult<T> = Result<T, RegistryError>;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Unknown job: {0}")]
    UnknownJob(JobId),

    #[error("Job {0} is already in a terminal state")]
    AlreadyTerminal(JobId),

    #[error("Job {0} is still active and cannot be retried")]
    NotTerminal(JobId),
}
