//! In-memory backend and scripted probe for tests.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use warden_core::{Credential, InstanceSpec, PortBinding, ResourceStats};

use crate::backend::{ExecOutput, WorkloadBackend};
use crate::error::{BackendError, BackendResult};
use crate::probe::{HealthProbe, LIVENESS_QUERY, ProbeError, QueryOutput};

#[derive(Debug, Clone)]
struct MockInstance {
    ports: Vec<PortBinding>,
    running: bool,
}

#[derive(Debug)]
struct MockState {
    instances: BTreeMap<String, MockInstance>,
    calls: Vec<String>,
    fail_start: bool,
    fail_stop: bool,
    fail_stats: bool,
    fail_inspect: bool,
    fail_exists: bool,
    missing_binary: bool,
    start_stopped: bool,
    unpublished: Vec<u16>,
    stats: ResourceStats,
    exec_outputs: HashMap<String, ExecOutput>,
}

/// A workload backend that keeps instances in a map.
///
/// Mirrors Docker's behaviour where it matters to the controller: starting
/// a taken name fails, removing a running instance fails, and operations
/// on an unknown name report `NotFound`.
#[derive(Debug)]
pub struct MockBackend {
    state: Mutex<MockState>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        let exec_outputs = HashMap::from([
            (
                "du".to_string(),
                ExecOutput {
                    exit_code: Some(0),
                    stdout: "517M\t/data\n".to_string(),
                    stderr: String::new(),
                },
            ),
            (
                "cypher-shell".to_string(),
                ExecOutput {
                    exit_code: Some(0),
                    stdout: "1\n1\n".to_string(),
                    stderr: String::new(),
                },
            ),
        ]);
        Self {
            state: Mutex::new(MockState {
                instances: BTreeMap::new(),
                calls: Vec::new(),
                fail_start: false,
                fail_stop: false,
                fail_stats: false,
                fail_inspect: false,
                fail_exists: false,
                missing_binary: false,
                start_stopped: false,
                unpublished: Vec::new(),
                stats: ResourceStats {
                    cpu_percent: 1.5,
                    memory_usage: "612MiB / 7.6GiB".to_string(),
                    memory_percent: 7.8,
                    network_io: "1.4kB / 0B".to_string(),
                    block_io: "41MB / 1MB".to_string(),
                },
                exec_outputs,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn with_state(self, f: impl FnOnce(&mut MockState)) -> Self {
        f(&mut self.lock());
        self
    }

    /// Pre-existing running instance with no published ports.
    pub fn with_running(self, name: &str) -> Self {
        self.with_instance(name, true)
    }

    /// Pre-existing stopped instance.
    pub fn with_stopped(self, name: &str) -> Self {
        self.with_instance(name, false)
    }

    fn with_instance(self, name: &str, running: bool) -> Self {
        self.with_state(|s| {
            s.instances.insert(
                name.to_string(),
                MockInstance {
                    ports: Vec::new(),
                    running,
                },
            );
        })
    }

    pub fn failing_start(self) -> Self {
        self.with_state(|s| s.fail_start = true)
    }

    pub fn failing_stop(self) -> Self {
        self.with_state(|s| s.fail_stop = true)
    }

    pub fn failing_stats(self) -> Self {
        self.with_state(|s| s.fail_stats = true)
    }

    /// `is_running` fails with a daemon error.
    pub fn failing_inspect(self) -> Self {
        self.with_state(|s| s.fail_inspect = true)
    }

    /// `exists` times out.
    pub fn failing_exists(self) -> Self {
        self.with_state(|s| s.fail_exists = true)
    }

    /// Every call fails as if the backend binary were not installed.
    pub fn missing_binary(self) -> Self {
        self.with_state(|s| s.missing_binary = true)
    }

    /// Started instances exist but never report running.
    pub fn starting_stopped(self) -> Self {
        self.with_state(|s| s.start_stopped = true)
    }

    /// Drop a container port from the bindings of started instances.
    pub fn unpublish(self, internal: u16) -> Self {
        self.with_state(|s| s.unpublished.push(internal))
    }

    pub fn set_running(&self, name: &str, running: bool) {
        if let Some(inst) = self.lock().instances.get_mut(name) {
            inst.running = running;
        }
    }

    /// Output returned for commands whose program (first word) matches.
    pub fn set_exec_output(&self, program: &str, output: ExecOutput) {
        self.lock().exec_outputs.insert(program.to_string(), output);
    }

    pub fn has_instance(&self, name: &str) -> bool {
        self.lock().instances.contains_key(name)
    }

    pub fn instance_count(&self) -> usize {
        self.lock().instances.len()
    }

    /// Every call made, in order, as `"<op> <name> [args]"`.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    fn record(&self, call: String) -> BackendResult<()> {
        let mut state = self.lock();
        let missing = state.missing_binary;
        state.calls.push(call.clone());
        if missing {
            return Err(BackendError::ExecFailed {
                command: call,
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
            });
        }
        Ok(())
    }
}

fn command_failed(command: &str, stderr: &str) -> BackendError {
    BackendError::CommandFailed {
        command: command.to_string(),
        stderr: stderr.to_string(),
        exit_code: Some(1),
    }
}

#[async_trait]
impl WorkloadBackend for MockBackend {
    async fn start(&self, spec: &InstanceSpec) -> BackendResult<()> {
        self.record(format!("start {}", spec.name))?;
        let mut state = self.lock();
        if state.fail_start {
            return Err(command_failed("start", "image pull failed"));
        }
        if state.instances.contains_key(&spec.name) {
            return Err(command_failed(
                "start",
                "Conflict. The container name is already in use",
            ));
        }
        let ports = spec
            .ports
            .iter()
            .filter(|p| !state.unpublished.contains(&p.internal))
            .map(|p| PortBinding {
                protocol: "tcp".to_string(),
                external: p.external,
                internal: p.internal,
            })
            .collect();
        let running = !state.start_stopped;
        state
            .instances
            .insert(spec.name.clone(), MockInstance { ports, running });
        Ok(())
    }

    async fn stop(&self, name: &str) -> BackendResult<()> {
        self.record(format!("stop {name}"))?;
        let mut state = self.lock();
        if state.fail_stop {
            return Err(command_failed("stop", "daemon busy"));
        }
        match state.instances.get_mut(name) {
            Some(inst) => {
                inst.running = false;
                Ok(())
            }
            None => Err(BackendError::NotFound(name.to_string())),
        }
    }

    async fn remove(&self, name: &str) -> BackendResult<()> {
        self.record(format!("remove {name}"))?;
        let mut state = self.lock();
        match state.instances.get(name).map(|i| i.running) {
            Some(true) => Err(command_failed(
                "remove",
                "You cannot remove a running container",
            )),
            Some(false) => {
                state.instances.remove(name);
                Ok(())
            }
            None => Err(BackendError::NotFound(name.to_string())),
        }
    }

    async fn exists(&self, name: &str) -> BackendResult<bool> {
        self.record(format!("exists {name}"))?;
        let state = self.lock();
        if state.fail_exists {
            return Err(BackendError::Timeout {
                command: "docker ps".to_string(),
                timeout: Duration::from_secs(30),
            });
        }
        Ok(state.instances.contains_key(name))
    }

    async fn is_running(&self, name: &str) -> BackendResult<bool> {
        self.record(format!("is_running {name}"))?;
        let state = self.lock();
        if state.fail_inspect {
            return Err(command_failed("inspect", "error during connect"));
        }
        Ok(state.instances.get(name).is_some_and(|i| i.running))
    }

    async fn ports_of(&self, name: &str) -> BackendResult<Vec<PortBinding>> {
        self.record(format!("ports_of {name}"))?;
        self.lock()
            .instances
            .get(name)
            .map(|i| i.ports.clone())
            .ok_or_else(|| BackendError::NotFound(name.to_string()))
    }

    async fn resource_stats(&self, name: &str) -> BackendResult<ResourceStats> {
        self.record(format!("resource_stats {name}"))?;
        let state = self.lock();
        if state.fail_stats {
            return Err(command_failed("stats", "cgroup unavailable"));
        }
        match state.instances.get(name) {
            Some(inst) if inst.running => Ok(state.stats.clone()),
            Some(_) => Err(command_failed("stats", "container is not running")),
            None => Err(BackendError::NotFound(name.to_string())),
        }
    }

    async fn exec(&self, name: &str, command: &[&str]) -> BackendResult<ExecOutput> {
        self.record(format!("exec {name} {}", command.join(" ")))?;
        let state = self.lock();
        match state.instances.get(name) {
            Some(inst) if inst.running => {}
            Some(_) => return Err(command_failed("exec", "container is not running")),
            None => return Err(BackendError::NotFound(name.to_string())),
        }
        let program = command.first().copied().unwrap_or_default();
        Ok(state
            .exec_outputs
            .get(program)
            .cloned()
            .unwrap_or(ExecOutput {
                exit_code: Some(127),
                stdout: String::new(),
                stderr: format!("{program}: not found"),
            }))
    }
}

// ── Probe ──────────────────────────────────────────────────────────

#[derive(Debug)]
struct ProbeState {
    liveness: VecDeque<bool>,
    default_liveness: bool,
    answers: Vec<(String, Option<String>)>,
    delay: Duration,
    calls: Vec<String>,
}

/// A probe whose answers are scripted up front.
///
/// Liveness (`RETURN 1`) results are taken from a queue, then fall back to
/// a default. Other statements are matched by substring against
/// registered answers; unmatched statements are rejected.
#[derive(Debug)]
pub struct ScriptedProbe {
    state: Mutex<ProbeState>,
}

impl ScriptedProbe {
    fn with_default(default_liveness: bool) -> Self {
        Self {
            state: Mutex::new(ProbeState {
                liveness: VecDeque::new(),
                default_liveness,
                answers: Vec::new(),
                delay: Duration::ZERO,
                calls: Vec::new(),
            }),
        }
    }

    /// Liveness always succeeds.
    pub fn healthy() -> Self {
        Self::with_default(true)
    }

    /// Liveness always fails.
    pub fn failing() -> Self {
        Self::with_default(false)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ProbeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Liveness results consumed before the default applies.
    pub fn with_liveness(self, results: impl IntoIterator<Item = bool>) -> Self {
        self.lock().liveness.extend(results);
        self
    }

    /// Answer statements containing `pattern` with a single scalar, or
    /// reject them when `value` is `None`.
    pub fn answer(self, pattern: &str, value: Option<&str>) -> Self {
        self.lock()
            .answers
            .push((pattern.to_string(), value.map(str::to_string)));
        self
    }

    /// Simulated round-trip time for every query.
    pub fn with_delay(self, delay: Duration) -> Self {
        self.lock().delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn liveness_calls(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.as_str() == LIVENESS_QUERY)
            .count()
    }
}

fn rejected(message: &str) -> ProbeError {
    ProbeError::Rejected {
        exit_code: Some(1),
        message: message.to_string(),
    }
}

#[async_trait]
impl HealthProbe for ScriptedProbe {
    async fn query(
        &self,
        _credential: &Credential,
        statement: &str,
    ) -> Result<QueryOutput, ProbeError> {
        let delay = {
            let mut state = self.lock();
            state.calls.push(statement.to_string());
            state.delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock();
        if statement == LIVENESS_QUERY {
            let ok = state.liveness.pop_front().unwrap_or(state.default_liveness);
            return if ok {
                Ok(QueryOutput {
                    rows: vec!["1".to_string()],
                })
            } else {
                Err(rejected("Connection refused"))
            };
        }

        match state.answers.iter().find(|(p, _)| statement.contains(p.as_str())) {
            Some((_, Some(value))) => Ok(QueryOutput {
                rows: vec![value.clone()],
            }),
            Some((_, None)) => Err(rejected("unsupported statement")),
            None => Err(rejected("no scripted answer")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str) -> InstanceSpec {
        InstanceSpec {
            name: name.to_string(),
            image: "neo4j:5".to_string(),
            ports: Vec::new(),
            volumes: Vec::new(),
            env: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn start_rejects_taken_name() {
        let backend = MockBackend::new();
        backend.start(&spec("a")).await.unwrap();
        assert!(backend.start(&spec("a")).await.is_err());
        assert_eq!(backend.instance_count(), 1);
    }

    #[tokio::test]
    async fn remove_requires_stop() {
        let backend = MockBackend::new().with_running("a");
        assert!(backend.remove("a").await.is_err());
        backend.stop("a").await.unwrap();
        backend.remove("a").await.unwrap();
        assert!(!backend.has_instance("a"));
    }

    #[tokio::test]
    async fn scripted_liveness_then_default() {
        let probe = ScriptedProbe::healthy().with_liveness([false]);
        let cred = Credential::new("u", "p");
        assert!(probe.query(&cred, LIVENESS_QUERY).await.is_err());
        assert!(probe.query(&cred, LIVENESS_QUERY).await.is_ok());
        assert_eq!(probe.liveness_calls(), 2);
    }
}
