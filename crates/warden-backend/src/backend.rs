//! The workload backend seam.

use async_trait::async_trait;

use warden_core::{InstanceSpec, PortBinding, ResourceStats};

use crate::error::BackendResult;

/// Captured result of a command run inside an instance.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExecOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Lifecycle and inspection operations on a named service instance.
///
/// Implementations must be safe to call for instances that do not exist:
/// `exists` and `is_running` return `Ok(false)`, `ports_of` returns
/// `NotFound`.
#[async_trait]
pub trait WorkloadBackend: Send + Sync {
    /// Create and start the instance. Fails if the name is taken.
    async fn start(&self, spec: &InstanceSpec) -> BackendResult<()>;

    async fn stop(&self, name: &str) -> BackendResult<()>;

    async fn remove(&self, name: &str) -> BackendResult<()>;

    /// Whether an instance with this name exists, running or not.
    async fn exists(&self, name: &str) -> BackendResult<bool>;

    async fn is_running(&self, name: &str) -> BackendResult<bool>;

    async fn ports_of(&self, name: &str) -> BackendResult<Vec<PortBinding>>;

    async fn resource_stats(&self, name: &str) -> BackendResult<ResourceStats>;

    /// Run a command inside the instance. A non-zero exit is returned in
    /// the output, not as an error.
    async fn exec(&self, name: &str, command: &[&str]) -> BackendResult<ExecOutput>;
}
