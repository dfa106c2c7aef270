//! Error types for health monitoring.

use thiserror::Error;

use warden_backend::BackendError;
use warden_journal::JournalError;

pub type MonitorResult<T> = Result<T, MonitorError>;

/// Failures that stop a monitor invocation from recording anything useful.
///
/// Instance and probe failures are not errors; they become DOWN records.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Journal(#[from] JournalError),
}
