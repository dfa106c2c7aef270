//! Error types for the journal.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for journal operations.
pub type JournalResult<T> = Result<T, JournalError>;

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("journal I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed record {line:?}: {reason}")]
    Parse { line: String, reason: String },
}

impl JournalError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        JournalError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn parse(line: &str, reason: impl Into<String>) -> Self {
        JournalError::Parse {
            line: line.to_string(),
            reason: reason.into(),
        }
    }
}
