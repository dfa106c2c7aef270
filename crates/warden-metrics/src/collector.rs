//! Samples one [`MetricsRecord`] on demand.

use std::sync::Arc;

use tracing::debug;

use warden_backend::{BackendResult, HealthProbe, ProbeError, WorkloadBackend};
use warden_core::{Credential, ResourceStats, ServiceInstance};
use warden_journal::{Field, MetricsRecord, Timestamp};

pub const NODE_COUNT_QUERY: &str = "MATCH (n) RETURN count(n) AS count";
pub const RELATIONSHIP_COUNT_QUERY: &str = "MATCH ()-[r]->() RETURN count(r) AS count";

/// Takes best-effort samples for one instance.
pub struct MetricsCollector {
    backend: Arc<dyn WorkloadBackend>,
    probe: Arc<dyn HealthProbe>,
    instance: String,
    credential: Credential,
    /// Data directory inside the instance, measured with `du`.
    data_dir: String,
}

impl MetricsCollector {
    pub fn new(
        backend: Arc<dyn WorkloadBackend>,
        probe: Arc<dyn HealthProbe>,
        instance: &ServiceInstance,
        data_dir: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            probe,
            instance: instance.name.clone(),
            credential: instance.credential.clone(),
            data_dir: data_dir.into(),
        }
    }

    /// Sample every field once.
    ///
    /// Returns `Err` only when the backend cannot be executed at all.
    pub async fn collect(&self) -> BackendResult<MetricsRecord> {
        let timestamp = Timestamp::now();
        let resources = self.sample_resources().await?;
        let db_size = self.sample_db_size().await?;
        let node_count = self.sample_count(NODE_COUNT_QUERY).await?;
        let relationship_count = self.sample_count(RELATIONSHIP_COUNT_QUERY).await?;

        let record = MetricsRecord::new(timestamp, resources, db_size, node_count, relationship_count);
        debug!(
            instance = %self.instance,
            cpu = ?record.cpu_percent.as_option(),
            nodes = ?record.node_count.as_option(),
            "metrics sampled"
        );
        Ok(record)
    }

    async fn sample_resources(&self) -> BackendResult<Option<ResourceStats>> {
        match self.backend.resource_stats(&self.instance).await {
            Ok(stats) => Ok(Some(stats)),
            Err(e) if e.is_environment() => Err(e),
            Err(e) => {
                debug!(instance = %self.instance, error = %e, "resource stats unavailable");
                Ok(None)
            }
        }
    }

    async fn sample_db_size(&self) -> BackendResult<Field<String>> {
        let output = match self
            .backend
            .exec(&self.instance, &["du", "-sh", &self.data_dir])
            .await
        {
            Ok(output) => output,
            Err(e) if e.is_environment() => return Err(e),
            Err(e) => {
                debug!(instance = %self.instance, error = %e, "db size unavailable");
                return Ok(Field::Unavailable);
            }
        };
        if !output.success() {
            debug!(instance = %self.instance, stderr = %output.stderr.trim(), "db size command failed");
            return Ok(Field::Unavailable);
        }
        // `517M\t/data`
        Ok(output
            .stdout
            .split_whitespace()
            .next()
            .map(str::to_string)
            .into())
    }

    async fn sample_count(&self, statement: &str) -> BackendResult<Field<u64>> {
        match self.probe.query(&self.credential, statement).await {
            Ok(out) => Ok(out.scalar_u64().into()),
            Err(ProbeError::Backend(e)) if e.is_environment() => Err(e),
            Err(e) => {
                debug!(instance = %self.instance, error = %e, statement, "count unavailable");
                Ok(Field::Unavailable)
            }
        }
    }
}
