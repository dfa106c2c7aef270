//! Post-readiness verification checklist.

use std::fmt;
use std::time::Duration;

use tracing::{debug, info, warn};

use warden_backend::{BackendResult, HealthProbe, ProbeError, WorkloadBackend};
use warden_core::{PortBinding, PortRole, ServiceInstance};
use warden_health::timed_liveness;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Failing it fails the deployment.
    Fatal,
    /// Reported, never fails the deployment.
    Advisory,
}

/// The checks, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckKind {
    ProcessRunning,
    AdminPortExposed,
    QueryPortExposed,
    AdminQuerySucceeds,
    ResourceStatsObtainable,
}

impl CheckKind {
    pub const ALL: [CheckKind; 5] = [
        CheckKind::ProcessRunning,
        CheckKind::AdminPortExposed,
        CheckKind::QueryPortExposed,
        CheckKind::AdminQuerySucceeds,
        CheckKind::ResourceStatsObtainable,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CheckKind::ProcessRunning => "process-running",
            CheckKind::AdminPortExposed => "admin-port-exposed",
            CheckKind::QueryPortExposed => "query-port-exposed",
            CheckKind::AdminQuerySucceeds => "admin-query-succeeds",
            CheckKind::ResourceStatsObtainable => "resource-stats-obtainable",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            CheckKind::AdminPortExposed | CheckKind::ResourceStatsObtainable => Severity::Advisory,
            _ => Severity::Fatal,
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationResult {
    pub kind: CheckKind,
    pub passed: bool,
    pub detail: Option<String>,
}

impl VerificationResult {
    pub fn pass(kind: CheckKind) -> Self {
        Self {
            kind,
            passed: true,
            detail: None,
        }
    }

    pub fn fail(kind: CheckKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            passed: false,
            detail: Some(detail.into()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn is_fatal_failure(&self) -> bool {
        !self.passed && self.kind.severity() == Severity::Fatal
    }
}

/// All check results of one verification pass.
#[derive(Debug, Clone)]
pub struct Checklist {
    pub results: Vec<VerificationResult>,
    /// Round trip of the administrative query when it succeeded.
    pub admin_latency: Option<Duration>,
}

impl Checklist {
    pub fn new(results: Vec<VerificationResult>, admin_latency: Option<Duration>) -> Self {
        Self {
            results,
            admin_latency,
        }
    }

    /// AND over the fatal checks. Advisory outcomes are ignored.
    pub fn passed(&self) -> bool {
        !self.results.iter().any(VerificationResult::is_fatal_failure)
    }

    pub fn fatal_failures(&self) -> impl Iterator<Item = &VerificationResult> {
        self.results.iter().filter(|r| r.is_fatal_failure())
    }

    pub fn result(&self, kind: CheckKind) -> Option<&VerificationResult> {
        self.results.iter().find(|r| r.kind == kind)
    }
}

/// Evaluate every check against the instance, in order.
///
/// A failing check never short-circuits the rest. Only environment errors
/// are returned as `Err`.
pub async fn run_checklist(
    backend: &dyn WorkloadBackend,
    probe: &dyn HealthProbe,
    instance: &ServiceInstance,
) -> BackendResult<Checklist> {
    let name = &instance.name;
    let mut results = Vec::with_capacity(CheckKind::ALL.len());

    results.push(match backend.is_running(name).await {
        Ok(true) => VerificationResult::pass(CheckKind::ProcessRunning),
        Ok(false) => VerificationResult::fail(CheckKind::ProcessRunning, "instance not running"),
        Err(e) if e.is_environment() => return Err(e),
        Err(e) => VerificationResult::fail(CheckKind::ProcessRunning, e.to_string()),
    });

    let bindings = match backend.ports_of(name).await {
        Ok(bindings) => Ok(bindings),
        Err(e) if e.is_environment() => return Err(e),
        Err(e) => Err(e.to_string()),
    };
    results.push(port_check(CheckKind::AdminPortExposed, PortRole::Admin, instance, &bindings));
    results.push(port_check(CheckKind::QueryPortExposed, PortRole::Query, instance, &bindings));

    let mut admin_latency = None;
    results.push(match timed_liveness(probe, &instance.credential).await {
        Ok(latency) => {
            admin_latency = Some(latency);
            VerificationResult::pass(CheckKind::AdminQuerySucceeds)
        }
        Err(ProbeError::Backend(e)) if e.is_environment() => return Err(e),
        Err(e) => VerificationResult::fail(CheckKind::AdminQuerySucceeds, e.to_string()),
    });

    results.push(match backend.resource_stats(name).await {
        Ok(stats) => {
            debug!(instance = %name, cpu = stats.cpu_percent, "resource stats obtained");
            VerificationResult::pass(CheckKind::ResourceStatsObtainable)
        }
        Err(e) if e.is_environment() => return Err(e),
        Err(e) => VerificationResult::fail(CheckKind::ResourceStatsObtainable, e.to_string()),
    });

    for r in &results {
        match (r.passed, r.kind.severity()) {
            (true, _) => info!(instance = %name, check = r.name(), "check passed"),
            (false, Severity::Fatal) => {
                warn!(instance = %name, check = r.name(), detail = ?r.detail, "fatal check failed")
            }
            (false, Severity::Advisory) => {
                warn!(instance = %name, check = r.name(), detail = ?r.detail, "advisory check failed")
            }
        }
    }

    Ok(Checklist::new(results, admin_latency))
}

fn port_check(
    kind: CheckKind,
    role: PortRole,
    instance: &ServiceInstance,
    bindings: &Result<Vec<PortBinding>, String>,
) -> VerificationResult {
    let Some(mapping) = instance.port(role) else {
        return VerificationResult::fail(kind, format!("no {role} port configured"));
    };
    let bindings = match bindings {
        Ok(b) => b,
        Err(e) => return VerificationResult::fail(kind, e.clone()),
    };
    if bindings
        .iter()
        .any(|b| b.internal == mapping.internal && b.external == mapping.external)
    {
        VerificationResult::pass(kind)
    } else {
        VerificationResult::fail(kind, format!("{} not published", mapping.publish_arg()))
    }
}
