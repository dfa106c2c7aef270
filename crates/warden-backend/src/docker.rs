//! Docker CLI implementation of [`WorkloadBackend`].
//!
//! All interactions go through [`DockerBackend::run`], which applies the
//! per-call timeout and maps spawn failures, timeouts and non-zero exits to
//! [`BackendError`]. The binary name is configurable so a CLI-compatible
//! runtime such as `podman` can stand in.

use std::process::Output;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use warden_core::{InstanceSpec, PortBinding, ResourceStats};

use crate::backend::{ExecOutput, WorkloadBackend};
use crate::error::{BackendError, BackendResult};

const STATS_FORMAT: &str = "{{.CPUPerc}}|{{.MemUsage}}|{{.MemPerc}}|{{.NetIO}}|{{.BlockIO}}";

#[derive(Debug, Clone)]
pub struct DockerBackend {
    binary: String,
    timeout: Duration,
}

impl DockerBackend {
    pub fn new(timeout: Duration) -> Self {
        Self {
            binary: "docker".to_string(),
            timeout,
        }
    }

    /// Use a different CLI-compatible binary.
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    fn command_string(&self, args: &[&str]) -> String {
        format!("{} {}", self.binary, args.join(" "))
    }

    /// Run a command with the timeout, returning raw output.
    async fn run(&self, args: &[&str]) -> BackendResult<Output> {
        let result = tokio::time::timeout(
            self.timeout,
            tokio::process::Command::new(&self.binary)
                .args(args)
                .kill_on_drop(true)
                .output(),
        )
        .await;

        match result {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(source)) => Err(BackendError::ExecFailed {
                command: self.command_string(args),
                source,
            }),
            Err(_) => Err(BackendError::Timeout {
                command: self.command_string(args),
                timeout: self.timeout,
            }),
        }
    }

    /// Run a command, returning output only if it exited 0.
    async fn run_success(&self, args: &[&str]) -> BackendResult<Output> {
        let output = self.run(args).await?;
        if output.status.success() {
            Ok(output)
        } else {
            Err(BackendError::failed(self.command_string(args), &output))
        }
    }
}

#[async_trait]
impl WorkloadBackend for DockerBackend {
    async fn start(&self, spec: &InstanceSpec) -> BackendResult<()> {
        let args = run_args(spec);
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self.run_success(&arg_refs).await?;
        debug!(
            instance = %spec.name,
            id = %String::from_utf8_lossy(&output.stdout).trim(),
            "container started"
        );
        Ok(())
    }

    async fn stop(&self, name: &str) -> BackendResult<()> {
        let output = self.run(&["stop", name]).await?;
        if output.status.success() {
            return Ok(());
        }
        if is_no_such(&output) {
            return Err(BackendError::NotFound(name.to_string()));
        }
        Err(BackendError::failed(self.command_string(&["stop", name]), &output))
    }

    async fn remove(&self, name: &str) -> BackendResult<()> {
        let output = self.run(&["rm", name]).await?;
        if output.status.success() {
            return Ok(());
        }
        if is_no_such(&output) {
            return Err(BackendError::NotFound(name.to_string()));
        }
        Err(BackendError::failed(self.command_string(&["rm", name]), &output))
    }

    async fn exists(&self, name: &str) -> BackendResult<bool> {
        let filter = format!("name=^/{name}$");
        let output = self
            .run_success(&["ps", "-a", "--filter", &filter, "--format", "{{.Names}}"])
            .await?;
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .any(|line| line.trim() == name))
    }

    async fn is_running(&self, name: &str) -> BackendResult<bool> {
        let args = ["inspect", "-f", "{{.State.Running}}", name];
        let output = self.run(&args).await?;
        running_state(
            output.status.success(),
            &String::from_utf8_lossy(&output.stdout),
            &String::from_utf8_lossy(&output.stderr),
        )
        .ok_or_else(|| BackendError::failed(self.command_string(&args), &output))
    }

    async fn ports_of(&self, name: &str) -> BackendResult<Vec<PortBinding>> {
        let output = self
            .run(&["inspect", "--format={{json .NetworkSettings.Ports}}", name])
            .await?;
        if !output.status.success() {
            if is_no_such(&output) {
                return Err(BackendError::NotFound(name.to_string()));
            }
            return Err(BackendError::failed("docker inspect", &output));
        }
        parse_ports(&String::from_utf8_lossy(&output.stdout))
    }

    async fn resource_stats(&self, name: &str) -> BackendResult<ResourceStats> {
        let output = self
            .run_success(&["stats", "--no-stream", "--format", STATS_FORMAT, name])
            .await?;
        parse_stats(&String::from_utf8_lossy(&output.stdout))
    }

    async fn exec(&self, name: &str, command: &[&str]) -> BackendResult<ExecOutput> {
        let mut args = vec!["exec", name];
        args.extend_from_slice(command);
        let output = self.run(&args).await?;
        Ok(ExecOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Arguments for `docker run -d ...`.
fn run_args(spec: &InstanceSpec) -> Vec<String> {
    let mut args = vec![
        "run".to_string(),
        "-d".to_string(),
        "--name".to_string(),
        spec.name.clone(),
    ];
    for port in &spec.ports {
        args.push("-p".to_string());
        args.push(port.publish_arg());
    }
    for volume in &spec.volumes {
        args.push("-v".to_string());
        args.push(volume.clone());
    }
    for (key, value) in &spec.env {
        args.push("-e".to_string());
        args.push(format!("{key}={value}"));
    }
    args.push(spec.image.clone());
    args
}

fn is_no_such(output: &Output) -> bool {
    names_missing(&String::from_utf8_lossy(&output.stderr))
}

fn names_missing(stderr: &str) -> bool {
    stderr.contains("No such container") || stderr.contains("No such object")
}

/// Classify `inspect -f {{.State.Running}}` output.
///
/// An unknown name is a stopped instance. Any other failure, such as an
/// unreachable daemon, leaves the state undetermined (`None`).
pub(crate) fn running_state(success: bool, stdout: &str, stderr: &str) -> Option<bool> {
    if success {
        Some(stdout.trim() == "true")
    } else if names_missing(stderr) {
        Some(false)
    } else {
        None
    }
}

/// Parse `{{json .NetworkSettings.Ports}}` output.
///
/// `{"7474/tcp":[{"HostIp":"0.0.0.0","HostPort":"7474"}],"7473/tcp":null}`
/// yields one binding per published container port; unpublished ports
/// (`null`) are skipped.
pub(crate) fn parse_ports(json: &str) -> BackendResult<Vec<PortBinding>> {
    let value: serde_json::Value = serde_json::from_str(json.trim())
        .map_err(|e| BackendError::Parse(format!("port json: {e}")))?;

    let mut bindings = Vec::new();
    let Some(ports) = value.as_object() else {
        return Ok(bindings);
    };
    for (container_port, host_bindings) in ports {
        let (port, protocol) = container_port
            .split_once('/')
            .unwrap_or((container_port.as_str(), "tcp"));
        let Ok(internal) = port.parse::<u16>() else {
            continue;
        };
        let external = host_bindings
            .as_array()
            .and_then(|b| b.first())
            .and_then(|b| b.get("HostPort"))
            .and_then(|p| p.as_str())
            .and_then(|p| p.parse::<u16>().ok());
        if let Some(external) = external {
            bindings.push(PortBinding {
                protocol: protocol.to_string(),
                external,
                internal,
            });
        }
    }
    bindings.sort_by_key(|b| b.internal);
    Ok(bindings)
}

/// Parse one line of `docker stats --format` output using [`STATS_FORMAT`].
pub(crate) fn parse_stats(raw: &str) -> BackendResult<ResourceStats> {
    let line = raw
        .lines()
        .find(|l| !l.trim().is_empty())
        .ok_or_else(|| BackendError::Parse("empty stats output".to_string()))?;
    let cols: Vec<&str> = line.split('|').map(str::trim).collect();
    if cols.len() != 5 {
        return Err(BackendError::Parse(format!("stats line {line:?}")));
    }
    Ok(ResourceStats {
        cpu_percent: parse_percent(cols[0])?,
        memory_usage: cols[1].to_string(),
        memory_percent: parse_percent(cols[2])?,
        network_io: cols[3].to_string(),
        block_io: cols[4].to_string(),
    })
}

fn parse_percent(raw: &str) -> BackendResult<f64> {
    raw.trim_end_matches('%')
        .parse::<f64>()
        .map_err(|_| BackendError::Parse(format!("percentage {raw:?}")))
}
