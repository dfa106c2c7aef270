//! Health probe seam and the `cypher-shell` implementation.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use warden_core::Credential;

use crate::backend::WorkloadBackend;
use crate::error::BackendError;

/// Trivial round-trip statement used for liveness.
pub const LIVENESS_QUERY: &str = "RETURN 1";

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// The query ran but the service rejected it (auth failure, syntax,
    /// unsupported procedure, service still starting).
    #[error("query rejected (exit {exit_code:?}): {message}")]
    Rejected {
        exit_code: Option<i32>,
        message: String,
    },
}

impl ProbeError {
    pub fn is_environment(&self) -> bool {
        matches!(self, ProbeError::Backend(e) if e.is_environment())
    }
}

/// Result rows of a successful query, header removed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryOutput {
    pub rows: Vec<String>,
}

impl QueryOutput {
    /// Parse `--format plain` output: first line is the column header.
    pub fn from_plain(stdout: &str) -> Self {
        let rows = stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .skip(1)
            .map(str::to_string)
            .collect();
        Self { rows }
    }

    /// First value of the first row.
    pub fn scalar(&self) -> Option<&str> {
        self.rows
            .first()
            .and_then(|row| row.split(',').next())
            .map(str::trim)
    }

    pub fn scalar_u64(&self) -> Option<u64> {
        self.scalar().and_then(|s| s.parse().ok())
    }
}

/// Executes an administrative query against the service.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn query(&self, credential: &Credential, statement: &str)
    -> Result<QueryOutput, ProbeError>;
}

/// Runs statements with `cypher-shell` inside the instance via the backend.
pub struct CypherShellProbe {
    backend: Arc<dyn WorkloadBackend>,
    instance: String,
}

impl CypherShellProbe {
    pub fn new(backend: Arc<dyn WorkloadBackend>, instance: impl Into<String>) -> Self {
        Self {
            backend,
            instance: instance.into(),
        }
    }
}

#[async_trait]
impl HealthProbe for CypherShellProbe {
    async fn query(
        &self,
        credential: &Credential,
        statement: &str,
    ) -> Result<QueryOutput, ProbeError> {
        let output = self
            .backend
            .exec(
                &self.instance,
                &[
                    "cypher-shell",
                    "-u",
                    &credential.username,
                    "-p",
                    credential.secret(),
                    "--format",
                    "plain",
                    statement,
                ],
            )
            .await?;

        if !output.success() {
            debug!(
                instance = %self.instance,
                exit_code = ?output.exit_code,
                "cypher-shell query failed"
            );
            return Err(ProbeError::Rejected {
                exit_code: output.exit_code,
                message: output.stderr.trim().to_string(),
            });
        }
        Ok(QueryOutput::from_plain(&output.stdout))
    }
}
