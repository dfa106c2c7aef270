//! Bounded readiness polling after a fresh start.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use warden_backend::{BackendResult, HealthProbe, ProbeError, WorkloadBackend};
use warden_core::{ServiceInstance, WardenConfig};
use warden_journal::Timestamp;

use crate::monitor::timed_liveness;

/// How many times to try, and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl ReadinessPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    pub fn from_config(config: &WardenConfig) -> Self {
        Self::new(config.poll_max_attempts, config.poll_interval)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The backend did not report the instance as running; probe skipped.
    NotRunning,
    /// Running, but the liveness query failed.
    ProbeFailed(String),
    Ready,
}

#[derive(Debug, Clone)]
pub struct ReadinessAttempt {
    /// 1-based.
    pub ordinal: u32,
    pub outcome: AttemptOutcome,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Ready,
    Exhausted,
}

#[derive(Debug, Clone)]
pub struct ReadinessReport {
    pub outcome: PollOutcome,
    pub attempts: Vec<ReadinessAttempt>,
    pub elapsed: Duration,
}

impl ReadinessReport {
    pub fn is_ready(&self) -> bool {
        self.outcome == PollOutcome::Ready
    }
}

/// Poll until the instance answers the liveness query or attempts run out.
///
/// Attempts are strictly sequential and spaced by `policy.interval`; there
/// is no sleep after the final attempt. Only environment errors (backend
/// binary unusable) are returned as `Err`.
pub async fn poll_until_ready(
    backend: &dyn WorkloadBackend,
    probe: &dyn HealthProbe,
    instance: &ServiceInstance,
    policy: ReadinessPolicy,
) -> BackendResult<ReadinessReport> {
    let started = Instant::now();
    let mut attempts = Vec::with_capacity(policy.max_attempts as usize);

    for ordinal in 1..=policy.max_attempts {
        let outcome = attempt(backend, probe, instance).await?;
        debug!(instance = %instance.name, ordinal, outcome = ?outcome, "readiness attempt");
        let ready = outcome == AttemptOutcome::Ready;
        attempts.push(ReadinessAttempt {
            ordinal,
            outcome,
            timestamp: Timestamp::now(),
        });

        if ready {
            info!(
                instance = %instance.name,
                attempts = ordinal,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "instance ready"
            );
            return Ok(ReadinessReport {
                outcome: PollOutcome::Ready,
                attempts,
                elapsed: started.elapsed(),
            });
        }
        if ordinal < policy.max_attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }

    warn!(
        instance = %instance.name,
        attempts = policy.max_attempts,
        "instance did not become ready"
    );
    Ok(ReadinessReport {
        outcome: PollOutcome::Exhausted,
        attempts,
        elapsed: started.elapsed(),
    })
}

async fn attempt(
    backend: &dyn WorkloadBackend,
    probe: &dyn HealthProbe,
    instance: &ServiceInstance,
) -> BackendResult<AttemptOutcome> {
    let running = match backend.is_running(&instance.name).await {
        Ok(running) => running,
        Err(e) if e.is_environment() => return Err(e),
        Err(e) => {
            debug!(instance = %instance.name, error = %e, "running check failed");
            false
        }
    };
    if !running {
        return Ok(AttemptOutcome::NotRunning);
    }

    match timed_liveness(probe, &instance.credential).await {
        Ok(_) => Ok(AttemptOutcome::Ready),
        Err(ProbeError::Backend(e)) if e.is_environment() => Err(e),
        Err(e) => Ok(AttemptOutcome::ProbeFailed(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use warden_backend::{MockBackend, ScriptedProbe};
    use warden_core::Credential;

    use super::*;

    const INTERVAL: Duration = Duration::from_secs(10);

    fn instance() -> ServiceInstance {
        ServiceInstance {
            name: "neo4j".to_string(),
            ports: Vec::new(),
            credential: Credential::new("neo4j", "pw"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn ready_on_third_attempt_sleeps_twice() {
        let backend = MockBackend::new().with_running("neo4j");
        let probe = ScriptedProbe::healthy().with_liveness([false, false]);

        let report = poll_until_ready(&backend, &probe, &instance(), ReadinessPolicy::new(30, INTERVAL))
            .await
            .unwrap();

        assert_eq!(report.outcome, PollOutcome::Ready);
        assert_eq!(report.attempts.len(), 3);
        assert_eq!(probe.liveness_calls(), 3);
        assert!(report.elapsed >= INTERVAL * 2);
        assert!(report.elapsed < INTERVAL * 3);
        let ordinals: Vec<u32> = report.attempts.iter().map(|a| a.ordinal).collect();
        assert_eq!(ordinals, vec![1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn first_attempt_success_does_not_sleep() {
        let backend = MockBackend::new().with_running("neo4j");
        let probe = ScriptedProbe::healthy();

        let report = poll_until_ready(&backend, &probe, &instance(), ReadinessPolicy::new(5, INTERVAL))
            .await
            .unwrap();

        assert!(report.is_ready());
        assert_eq!(report.attempts.len(), 1);
        assert!(report.elapsed < INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_after_max_attempts() {
        let backend = MockBackend::new().with_running("neo4j");
        let probe = ScriptedProbe::failing();

        let report = poll_until_ready(&backend, &probe, &instance(), ReadinessPolicy::new(4, INTERVAL))
            .await
            .unwrap();

        assert_eq!(report.outcome, PollOutcome::Exhausted);
        assert_eq!(report.attempts.len(), 4);
        assert_eq!(probe.liveness_calls(), 4);
        // max - 1 sleeps, none after the last attempt.
        assert!(report.elapsed >= INTERVAL * 3);
        assert!(report.elapsed < INTERVAL * 4);
        assert!(report
            .attempts
            .iter()
            .all(|a| matches!(a.outcome, AttemptOutcome::ProbeFailed(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn not_running_skips_probe() {
        let backend = MockBackend::new().with_stopped("neo4j");
        let probe = ScriptedProbe::healthy();

        let report = poll_until_ready(&backend, &probe, &instance(), ReadinessPolicy::new(3, INTERVAL))
            .await
            .unwrap();

        assert_eq!(report.outcome, PollOutcome::Exhausted);
        assert_eq!(probe.liveness_calls(), 0);
        assert!(report
            .attempts
            .iter()
            .all(|a| a.outcome == AttemptOutcome::NotRunning));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_backend_binary_propagates() {
        let backend = MockBackend::new().missing_binary();
        let probe = ScriptedProbe::healthy();

        let err = poll_until_ready(&backend, &probe, &instance(), ReadinessPolicy::new(3, INTERVAL))
            .await
            .unwrap_err();
        assert!(err.is_environment());
        assert_eq!(backend.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn instance_that_comes_up_later_becomes_ready() {
        let backend = Arc::new(MockBackend::new().with_stopped("neo4j"));
        let probe = ScriptedProbe::healthy();

        let flipper = {
            let backend = backend.clone();
            tokio::spawn(async move {
                tokio::time::sleep(INTERVAL + Duration::from_secs(1)).await;
                backend.set_running("neo4j", true);
            })
        };

        let report = poll_until_ready(
            backend.as_ref(),
            &probe,
            &instance(),
            ReadinessPolicy::new(5, INTERVAL),
        )
        .await
        .unwrap();
        flipper.await.unwrap();

        assert!(report.is_ready());
        assert_eq!(report.attempts.len(), 3);
        assert_eq!(report.attempts[0].outcome, AttemptOutcome::NotRunning);
        assert_eq!(report.attempts[1].outcome, AttemptOutcome::NotRunning);
        assert_eq!(probe.liveness_calls(), 1);
    }
}
