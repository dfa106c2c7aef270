//! Backend error types.

use std::time::Duration;

use thiserror::Error;

pub type BackendResult<T> = Result<T, BackendError>;

/// Errors from workload backend calls.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend binary could not be executed at all (not in PATH,
    /// permission denied). This is environment misconfiguration.
    #[error("failed to execute `{command}`: {source}")]
    ExecFailed {
        command: String,
        source: std::io::Error,
    },

    #[error("`{command}` timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("`{command}` failed (exit {exit_code:?}): {stderr}")]
    CommandFailed {
        command: String,
        stderr: String,
        exit_code: Option<i32>,
    },

    #[error("no such instance: {0}")]
    NotFound(String),

    #[error("unexpected backend output: {0}")]
    Parse(String),
}

impl BackendError {
    pub fn failed(command: impl Into<String>, output: &std::process::Output) -> Self {
        BackendError::CommandFailed {
            command: command.into(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            exit_code: output.status.code(),
        }
    }

    /// True when the error means the controller cannot talk to the backend
    /// at all, as opposed to the instance being absent or slow.
    pub fn is_environment(&self) -> bool {
        matches!(self, BackendError::ExecFailed { .. })
    }
}
