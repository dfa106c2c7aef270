//! One-shot health monitor.
//!
//! Each call to [`HealthMonitor::check_once`] appends exactly one health
//! record and, only when that record is UP, one metrics record.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

use warden_backend::{
    BackendResult, HealthProbe, LIVENESS_QUERY, ProbeError, WorkloadBackend,
};
use warden_core::{Credential, ServiceInstance};
use warden_journal::{HealthRecord, Journal, MetricsRecord, Timestamp};
use warden_metrics::MetricsCollector;

use crate::error::MonitorResult;

pub const NOT_RUNNING: &str = "instance not running";
pub const PROBE_FAILED: &str = "probe failed";

/// Run the liveness query once and measure its round trip.
pub async fn timed_liveness(
    probe: &dyn HealthProbe,
    credential: &Credential,
) -> Result<Duration, ProbeError> {
    let started = Instant::now();
    probe.query(credential, LIVENESS_QUERY).await?;
    Ok(started.elapsed())
}

/// What one monitor invocation recorded.
#[derive(Debug, Clone)]
pub struct MonitorReport {
    pub health: HealthRecord,
    /// Present iff `health` is UP.
    pub metrics: Option<MetricsRecord>,
}

pub struct HealthMonitor {
    backend: Arc<dyn WorkloadBackend>,
    probe: Arc<dyn HealthProbe>,
    instance: ServiceInstance,
    collector: MetricsCollector,
    journal: Journal,
}

impl HealthMonitor {
    pub fn new(
        backend: Arc<dyn WorkloadBackend>,
        probe: Arc<dyn HealthProbe>,
        instance: ServiceInstance,
        data_dir: impl Into<String>,
        journal: Journal,
    ) -> Self {
        let collector = MetricsCollector::new(backend.clone(), probe.clone(), &instance, data_dir);
        Self {
            backend,
            probe,
            instance,
            collector,
            journal,
        }
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// Observe liveness without writing anything.
    ///
    /// A backend failure other than an unusable binary leaves the state
    /// undetermined and yields an UNKNOWN record.
    pub async fn check_health(&self) -> BackendResult<HealthRecord> {
        let name = &self.instance.name;
        match self.backend.is_running(name).await {
            Ok(true) => {}
            Ok(false) => return Ok(HealthRecord::down(Timestamp::now(), NOT_RUNNING)),
            Err(e) if e.is_environment() => return Err(e),
            Err(e) => {
                warn!(instance = %name, error = %e, "could not determine running state");
                return Ok(HealthRecord::unknown(Timestamp::now()));
            }
        }

        match timed_liveness(self.probe.as_ref(), &self.instance.credential).await {
            Ok(latency) => Ok(HealthRecord::up(Timestamp::now(), latency.as_millis() as u64)),
            Err(ProbeError::Backend(e)) if e.is_environment() => Err(e),
            Err(e) => {
                warn!(instance = %name, error = %e, "liveness probe failed");
                Ok(HealthRecord::down(Timestamp::now(), PROBE_FAILED))
            }
        }
    }

    /// Check once, append the results, and report what was written.
    pub async fn check_once(&self) -> MonitorResult<MonitorReport> {
        let health = self.check_health().await?;
        self.journal.append_health(&health)?;

        let metrics = if health.is_up() {
            let record = self.collector.collect().await?;
            self.journal.append_metrics(&record)?;
            Some(record)
        } else {
            None
        };

        info!(
            instance = %self.instance.name,
            status = %health.status,
            response_time_ms = ?health.response_time_ms,
            metrics = metrics.is_some(),
            "health check recorded"
        );
        Ok(MonitorReport { health, metrics })
    }
}

#[cfg(test)]
mod tests {
    use warden_backend::{MockBackend, ScriptedProbe};
    use warden_journal::{Field, HealthStatus};

    use super::*;

    fn instance() -> ServiceInstance {
        ServiceInstance {
            name: "neo4j".to_string(),
            ports: Vec::new(),
            credential: Credential::new("neo4j", "pw"),
        }
    }

    fn graph_probe() -> ScriptedProbe {
        ScriptedProbe::healthy()
            .answer("MATCH (n)", Some("10"))
            .answer("MATCH ()-[r]->()", Some("20"))
    }

    fn monitor(
        backend: Arc<MockBackend>,
        probe: Arc<ScriptedProbe>,
        dir: &std::path::Path,
    ) -> HealthMonitor {
        let journal = Journal::open(dir, "neo4j").unwrap();
        HealthMonitor::new(backend, probe, instance(), "/data", journal)
    }

    #[tokio::test(start_paused = true)]
    async fn up_records_latency_and_metrics() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MockBackend::new().with_running("neo4j"));
        let probe = Arc::new(graph_probe().with_delay(Duration::from_millis(42)));
        let monitor = monitor(backend, probe, dir.path());

        let report = monitor.check_once().await.unwrap();
        assert_eq!(report.health.status, HealthStatus::Up);
        assert_eq!(report.health.response_time_ms, Some(42));
        assert!(report.metrics.is_some());

        let health = monitor.journal().tail_health(10).unwrap();
        assert_eq!(health.len(), 1);
        assert_eq!(health[0].status, HealthStatus::Up);
        assert_eq!(health[0].response_time_ms, Some(42));
        assert_eq!(health[0].error, None);

        let metrics = monitor.journal().tail_metrics(10).unwrap();
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].node_count, Field::Available(10));
    }

    #[tokio::test]
    async fn not_running_is_down_without_probe_or_metrics() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MockBackend::new().with_stopped("neo4j"));
        let probe = Arc::new(graph_probe());
        let monitor = monitor(backend, probe.clone(), dir.path());

        let report = monitor.check_once().await.unwrap();
        assert_eq!(report.health.status, HealthStatus::Down);
        assert_eq!(report.health.error.as_deref(), Some(NOT_RUNNING));
        assert!(report.metrics.is_none());
        assert!(probe.calls().is_empty());

        assert_eq!(monitor.journal().tail_health(10).unwrap().len(), 1);
        assert!(!monitor.journal().metrics_path().exists());
    }

    #[tokio::test]
    async fn absent_instance_is_down() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MockBackend::new());
        let monitor = monitor(backend, Arc::new(graph_probe()), dir.path());

        let report = monitor.check_once().await.unwrap();
        assert_eq!(report.health.error.as_deref(), Some(NOT_RUNNING));
    }

    #[tokio::test]
    async fn probe_failure_is_down() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MockBackend::new().with_running("neo4j"));
        let monitor = monitor(backend, Arc::new(ScriptedProbe::failing()), dir.path());

        let report = monitor.check_once().await.unwrap();
        assert_eq!(report.health.status, HealthStatus::Down);
        assert_eq!(report.health.error.as_deref(), Some(PROBE_FAILED));
        assert!(report.metrics.is_none());
        assert!(!monitor.journal().metrics_path().exists());
    }

    #[tokio::test]
    async fn undetermined_state_is_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MockBackend::new().with_running("neo4j").failing_inspect());
        let probe = Arc::new(graph_probe());
        let monitor = monitor(backend, probe.clone(), dir.path());

        let report = monitor.check_once().await.unwrap();
        assert_eq!(report.health.status, HealthStatus::Unknown);
        assert!(report.metrics.is_none());
        assert!(probe.calls().is_empty());
        let health = monitor.journal().tail_health(10).unwrap();
        assert_eq!(health[0].status, HealthStatus::Unknown);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unreachable_docker_daemon_is_unknown() {
        use std::os::unix::fs::PermissionsExt;

        use warden_backend::{CypherShellProbe, DockerBackend};

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("docker");
        std::fs::write(
            &script,
            "#!/bin/sh\necho 'Cannot connect to the Docker daemon at unix:///var/run/docker.sock' >&2\nexit 1\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let backend: Arc<dyn WorkloadBackend> = Arc::new(
            DockerBackend::new(Duration::from_secs(5))
                .with_binary(script.to_string_lossy().into_owned()),
        );
        let probe = Arc::new(CypherShellProbe::new(backend.clone(), "neo4j"));
        let journal = Journal::open(dir.path(), "neo4j").unwrap();
        let monitor = HealthMonitor::new(backend, probe, instance(), "/data", journal);

        let report = monitor.check_once().await.unwrap();
        assert_eq!(report.health.status, HealthStatus::Unknown);
        assert!(report.metrics.is_none());
    }

    #[tokio::test]
    async fn each_invocation_appends_one_health_record() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MockBackend::new().with_running("neo4j"));
        let monitor = monitor(backend.clone(), Arc::new(graph_probe()), dir.path());

        monitor.check_once().await.unwrap();
        backend.set_running("neo4j", false);
        monitor.check_once().await.unwrap();
        backend.set_running("neo4j", true);
        monitor.check_once().await.unwrap();

        let health = monitor.journal().tail_health(10).unwrap();
        let statuses: Vec<HealthStatus> = health.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![HealthStatus::Up, HealthStatus::Down, HealthStatus::Up]
        );
        assert_eq!(monitor.journal().tail_metrics(10).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn missing_backend_binary_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MockBackend::new().missing_binary());
        let monitor = monitor(backend, Arc::new(graph_probe()), dir.path());

        let err = monitor.check_once().await.unwrap_err();
        assert!(matches!(err, crate::MonitorError::Backend(ref e) if e.is_environment()));
        assert!(!monitor.journal().health_path().exists());
    }
}
