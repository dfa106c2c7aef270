//! Deployment controller: drives the deploy state machine.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use warden_backend::{BackendError, BackendResult, HealthProbe, WorkloadBackend};
use warden_core::{ServiceInstance, WardenConfig};
use warden_health::{PollOutcome, ReadinessPolicy, ReadinessReport, poll_until_ready};
use warden_journal::{HealthRecord, Journal, MetricsRecord, Timestamp};
use warden_metrics::MetricsCollector;

use crate::checklist::{Checklist, run_checklist};
use crate::error::DeployResult;
use crate::summary::DeploymentSummary;

/// Phase of a deployment run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployPhase {
    Idle,
    /// Stopping and removing any instance with the same name.
    TearingDown,
    StartingInstance,
    PollingReady,
    Verifying,
    Deployed,
    Failed,
}

impl DeployPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeployPhase::Deployed | DeployPhase::Failed)
    }
}

impl fmt::Display for DeployPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeployPhase::Idle => "idle",
            DeployPhase::TearingDown => "tearing-down",
            DeployPhase::StartingInstance => "starting-instance",
            DeployPhase::PollingReady => "polling-ready",
            DeployPhase::Verifying => "verifying",
            DeployPhase::Deployed => "deployed",
            DeployPhase::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Result of a run that reached a terminal phase.
#[derive(Debug, Clone)]
pub struct DeploymentOutcome {
    pub phase: DeployPhase,
    /// Every phase entered, starting with `Idle`.
    pub trail: Vec<DeployPhase>,
    /// Set iff `phase` is `Deployed`.
    pub summary: Option<DeploymentSummary>,
    /// Set iff `phase` is `Failed`.
    pub failure: Option<String>,
    pub readiness: Option<ReadinessReport>,
    pub checklist: Option<Checklist>,
}

impl DeploymentOutcome {
    pub fn is_deployed(&self) -> bool {
        self.phase == DeployPhase::Deployed
    }
}

/// What teardown found and did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Teardown {
    /// No instance by that name.
    Absent,
    Removed,
    /// An instance existed but could not be fully removed.
    Incomplete(String),
}

/// Stop and remove the named instance if it exists.
///
/// Absence is not an error. Only environment errors are returned as `Err`.
pub async fn teardown(backend: &dyn WorkloadBackend, name: &str) -> BackendResult<Teardown> {
    match backend.exists(name).await {
        Ok(true) => {}
        Ok(false) => {
            debug!(instance = %name, "nothing to tear down");
            return Ok(Teardown::Absent);
        }
        Err(e) if e.is_environment() => return Err(e),
        Err(e) => {
            warn!(instance = %name, error = %e, "existence lookup failed");
            return Ok(Teardown::Incomplete(e.to_string()));
        }
    }

    if let Err(e) = backend.stop(name).await {
        if e.is_environment() {
            return Err(e);
        }
        // An already-stopped instance may still report a stop failure.
        debug!(instance = %name, error = %e, "stop failed");
    }
    match backend.remove(name).await {
        Ok(()) | Err(BackendError::NotFound(_)) => {
            info!(instance = %name, "previous instance removed");
            Ok(Teardown::Removed)
        }
        Err(e) if e.is_environment() => Err(e),
        Err(e) => Ok(Teardown::Incomplete(e.to_string())),
    }
}

struct Trail {
    instance: String,
    phases: Vec<DeployPhase>,
}

impl Trail {
    fn new(instance: &str) -> Self {
        Self {
            instance: instance.to_string(),
            phases: vec![DeployPhase::Idle],
        }
    }

    fn enter(&mut self, phase: DeployPhase) {
        debug!(instance = %self.instance, %phase, "phase");
        self.phases.push(phase);
    }
}

/// Replaces, readies and verifies one instance per [`Deployer::run`].
pub struct Deployer {
    config: WardenConfig,
    instance: ServiceInstance,
    backend: Arc<dyn WorkloadBackend>,
    probe: Arc<dyn HealthProbe>,
    journal: Option<Journal>,
}

impl Deployer {
    pub fn new(
        config: WardenConfig,
        backend: Arc<dyn WorkloadBackend>,
        probe: Arc<dyn HealthProbe>,
    ) -> Self {
        let instance = config.service_instance();
        Self {
            config,
            instance,
            backend,
            probe,
            journal: None,
        }
    }

    /// Record deployment results in `journal`.
    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn instance(&self) -> &ServiceInstance {
        &self.instance
    }

    /// Run one deployment to a terminal phase.
    ///
    /// Returns `Err` only when the backend binary cannot be executed or
    /// the journal cannot be written.
    pub async fn run(&self) -> DeployResult<DeploymentOutcome> {
        let name = self.instance.name.as_str();
        let mut trail = Trail::new(name);
        info!(instance = %name, image = %self.config.image, "deployment started");

        trail.enter(DeployPhase::TearingDown);
        match teardown(self.backend.as_ref(), name).await? {
            Teardown::Incomplete(reason) => {
                warn!(instance = %name, %reason, "teardown incomplete, starting anyway");
            }
            Teardown::Absent | Teardown::Removed => {}
        }

        trail.enter(DeployPhase::StartingInstance);
        if let Err(e) = self.backend.start(&self.config.instance_spec()).await {
            if e.is_environment() {
                return Err(e.into());
            }
            return self.fail(trail, format!("start failed: {e}"), None, None);
        }
        info!(instance = %name, "instance started");

        trail.enter(DeployPhase::PollingReady);
        let readiness = poll_until_ready(
            self.backend.as_ref(),
            self.probe.as_ref(),
            &self.instance,
            ReadinessPolicy::from_config(&self.config),
        )
        .await?;
        if readiness.outcome == PollOutcome::Exhausted {
            let reason = format!(
                "instance not ready after {} attempts",
                readiness.attempts.len()
            );
            return self.fail(trail, reason, Some(readiness), None);
        }

        trail.enter(DeployPhase::Verifying);
        let checklist =
            run_checklist(self.backend.as_ref(), self.probe.as_ref(), &self.instance).await?;
        if !checklist.passed() {
            let failed: Vec<&str> = checklist.fatal_failures().map(|r| r.name()).collect();
            let reason = format!("verification failed: {}", failed.join("; "));
            return self.fail(trail, reason, Some(readiness), Some(checklist));
        }

        trail.enter(DeployPhase::Deployed);
        let first_sample = self.record_success(&checklist).await?;
        let log_dir = self
            .journal
            .as_ref()
            .map(|j| j.dir().to_path_buf())
            .unwrap_or_else(|| self.config.log_dir.clone());
        let summary = DeploymentSummary::new(&self.instance, log_dir, Some(first_sample));

        info!(
            instance = %name,
            attempts = readiness.attempts.len(),
            default_credential = self.instance.credential.is_default(),
            "deployment complete"
        );
        Ok(DeploymentOutcome {
            phase: DeployPhase::Deployed,
            trail: trail.phases,
            summary: Some(summary),
            failure: None,
            readiness: Some(readiness),
            checklist: Some(checklist),
        })
    }

    /// Append the initial UP record and first metrics sample.
    async fn record_success(&self, checklist: &Checklist) -> DeployResult<MetricsRecord> {
        let collector = MetricsCollector::new(
            self.backend.clone(),
            self.probe.clone(),
            &self.instance,
            self.config.data_dir.clone(),
        );
        let sample = collector.collect().await?;

        if let Some(journal) = &self.journal {
            let latency_ms = checklist
                .admin_latency
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0);
            journal.append_health(&HealthRecord::up(Timestamp::now(), latency_ms))?;
            journal.append_metrics(&sample)?;
        }
        Ok(sample)
    }

    fn fail(
        &self,
        mut trail: Trail,
        reason: String,
        readiness: Option<ReadinessReport>,
        checklist: Option<Checklist>,
    ) -> DeployResult<DeploymentOutcome> {
        trail.enter(DeployPhase::Failed);
        error!(instance = %self.instance.name, %reason, "deployment failed");
        if let Some(journal) = &self.journal {
            journal.append_health(&HealthRecord::down(Timestamp::now(), reason.as_str()))?;
        }
        Ok(DeploymentOutcome {
            phase: DeployPhase::Failed,
            trail: trail.phases,
            summary: None,
            failure: Some(reason),
            readiness,
            checklist,
        })
    }
}
