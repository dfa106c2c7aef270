//! Error types for deployment.

use thiserror::Error;

use warden_backend::BackendError;
use warden_journal::JournalError;

pub type DeployResult<T> = Result<T, DeployError>;

/// Errors that abort a run before it can reach a terminal phase.
///
/// Ordinary deployment failures are not errors: they end in
/// [`DeployPhase::Failed`](crate::DeployPhase::Failed).
#[derive(Debug, Error)]
pub enum DeployError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Journal(#[from] JournalError),
}
