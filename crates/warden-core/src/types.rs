//! Domain types shared across graphwarden crates.

use std::collections::BTreeMap;
use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

// ── Ports ──────────────────────────────────────────────────────────

/// Which advertised protocol a port mapping carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortRole {
    /// Administrative HTTP / browser endpoint.
    Admin,
    /// Binary query protocol (bolt).
    Query,
}

impl PortRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            PortRole::Admin => "admin",
            PortRole::Query => "query",
        }
    }

    /// URI scheme clients use to reach this port.
    pub fn scheme(&self) -> &'static str {
        match self {
            PortRole::Admin => "http",
            PortRole::Query => "bolt",
        }
    }
}

impl fmt::Display for PortRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host port → container port mapping for one protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    pub role: PortRole,
    pub external: u16,
    pub internal: u16,
}

impl PortMapping {
    pub fn new(role: PortRole, external: u16, internal: u16) -> Self {
        Self {
            role,
            external,
            internal,
        }
    }

    /// `-p` style publish argument, e.g. `7474:7474`.
    pub fn publish_arg(&self) -> String {
        format!("{}:{}", self.external, self.internal)
    }

    /// Access URI on the local host, e.g. `bolt://localhost:7687`.
    pub fn access_uri(&self) -> String {
        format!("{}://localhost:{}", self.role.scheme(), self.external)
    }
}

/// A port binding as reported by the workload backend for a live instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortBinding {
    /// Transport protocol, usually `tcp`.
    pub protocol: String,
    pub external: u16,
    pub internal: u16,
}

// ── Resource stats ─────────────────────────────────────────────────

/// Point-in-time resource usage of a running instance.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceStats {
    pub cpu_percent: f64,
    /// Absolute usage as reported, e.g. `512MiB / 2GiB`.
    pub memory_usage: String,
    pub memory_percent: f64,
    /// Received / sent, e.g. `1.2kB / 648B`.
    pub network_io: String,
    /// Read / written.
    pub block_io: String,
}

// ── Credential ─────────────────────────────────────────────────────

/// Administrative credential for the managed service.
#[derive(Debug)]
pub struct Credential {
    pub username: String,
    secret: SecretString,
    /// True when the secret is the built-in fallback rather than operator-supplied.
    is_default: bool,
}

impl Credential {
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: SecretString::new(secret.into()),
            is_default: false,
        }
    }

    /// Credential built from the fallback secret.
    pub fn fallback(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            is_default: true,
            ..Self::new(username, secret)
        }
    }

    pub fn secret(&self) -> &str {
        self.secret.expose_secret()
    }

    pub fn is_default(&self) -> bool {
        self.is_default
    }

    /// `user / ********`, for summaries and status output.
    pub fn masked(&self) -> String {
        let suffix = if self.is_default { " (default)" } else { "" };
        format!("{} / ********{suffix}", self.username)
    }

    /// Value for the service's `NEO4J_AUTH` bootstrap variable.
    pub fn auth_env(&self) -> String {
        format!("{}/{}", self.username, self.secret())
    }
}

impl Clone for Credential {
    fn clone(&self) -> Self {
        Self {
            username: self.username.clone(),
            secret: SecretString::new(self.secret().to_string()),
            is_default: self.is_default,
        }
    }
}

// ── Instance ───────────────────────────────────────────────────────

/// A named, addressable deployment unit.
#[derive(Debug, Clone)]
pub struct ServiceInstance {
    pub name: String,
    pub ports: Vec<PortMapping>,
    pub credential: Credential,
}

impl ServiceInstance {
    pub fn port(&self, role: PortRole) -> Option<&PortMapping> {
        self.ports.iter().find(|p| p.role == role)
    }

    pub fn access_uris(&self) -> Vec<String> {
        self.ports.iter().map(PortMapping::access_uri).collect()
    }
}

/// Everything the workload backend needs to create the instance.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceSpec {
    pub name: String,
    pub image: String,
    pub ports: Vec<PortMapping>,
    /// `host:container` volume mounts.
    pub volumes: Vec<String>,
    pub env: BTreeMap<String, String>,
}
