//! `warden.toml` parsing and configuration resolution.
//!
//! Resolution order, lowest precedence first: built-in defaults, the
//! optional TOML file, then environment variables. The result is a fully
//! populated [`WardenConfig`] that is handed to the orchestrator and the
//! monitor by value; nothing reads process-wide state after startup.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, ConfigResult};
use crate::types::{Credential, InstanceSpec, PortMapping, PortRole, ServiceInstance};

/// Environment variable carrying the administrative secret.
pub const PASSWORD_ENV: &str = "NEO4J_PASSWORD";
/// Environment variable overriding the administrative username.
pub const USER_ENV: &str = "NEO4J_USER";
/// Environment variable overriding the log directory.
pub const LOG_DIR_ENV: &str = "WARDEN_LOG_DIR";

const DEFAULT_INSTANCE_NAME: &str = "neo4j";
const DEFAULT_IMAGE: &str = "neo4j:5";
const DEFAULT_USERNAME: &str = "neo4j";
const DEFAULT_PASSWORD: &str = "password";
const DEFAULT_DATA_DIR: &str = "/data";
const DEFAULT_LOG_DIR: &str = "logs";
const DEFAULT_ADMIN_PORT: u16 = 7474;
const DEFAULT_QUERY_PORT: u16 = 7687;
const DEFAULT_POLL_MAX_ATTEMPTS: u32 = 30;
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

// ── File format ────────────────────────────────────────────────────

/// On-disk shape of `warden.toml`. Every key is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub instance: Option<InstanceSection>,
    pub credential: Option<CredentialSection>,
    pub ports: Option<PortsSection>,
    pub readiness: Option<ReadinessSection>,
    pub journal: Option<JournalSection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstanceSection {
    pub name: Option<String>,
    pub image: Option<String>,
    /// Data directory inside the instance, sampled for storage size.
    pub data_dir: Option<String>,
    pub volumes: Option<Vec<String>>,
    pub env: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialSection {
    pub username: Option<String>,
    /// Prefer `NEO4J_PASSWORD`; a secret in the file is accepted but discouraged.
    pub password: Option<String>,
    /// Fail closed instead of falling back to the default secret.
    pub require: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PortPair {
    pub external: u16,
    pub internal: u16,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortsSection {
    pub admin: Option<PortPair>,
    pub query: Option<PortPair>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReadinessSection {
    pub max_attempts: Option<u32>,
    /// e.g. "10s"
    pub interval: Option<String>,
    /// Per backend call, e.g. "30s"
    pub call_timeout: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JournalSection {
    pub dir: Option<PathBuf>,
}

impl ConfigFile {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

// ── Resolved config ────────────────────────────────────────────────

/// Fully resolved controller configuration.
#[derive(Debug)]
pub struct WardenConfig {
    pub instance_name: String,
    pub image: String,
    pub credential: Credential,
    pub ports: Vec<PortMapping>,
    pub poll_max_attempts: u32,
    pub poll_interval: Duration,
    pub call_timeout: Duration,
    pub log_dir: PathBuf,
    pub data_dir: String,
    pub volumes: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub require_credential: bool,
}

impl WardenConfig {
    /// Load from an optional file plus the process environment.
    ///
    /// A missing file at the default location is not an error; an explicit
    /// path that cannot be read is.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let file = match path {
            Some(p) => Some(ConfigFile::from_file(p)?),
            None => {
                let default = Path::new("warden.toml");
                if default.is_file() {
                    Some(ConfigFile::from_file(default)?)
                } else {
                    None
                }
            }
        };
        Self::resolve(file.unwrap_or_default(), |key| std::env::var(key).ok())
    }

    /// Merge a parsed file with an environment lookup.
    pub fn resolve(file: ConfigFile, env: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        let instance = file.instance.unwrap_or_default();
        let cred = file.credential.unwrap_or_default();
        let ports = file.ports.unwrap_or_default();
        let readiness = file.readiness.unwrap_or_default();
        let journal = file.journal.unwrap_or_default();

        let require_credential = cred.require.unwrap_or(false);
        let username = env(USER_ENV)
            .filter(|u| !u.is_empty())
            .or(cred.username)
            .unwrap_or_else(|| DEFAULT_USERNAME.to_string());
        let secret = env(PASSWORD_ENV)
            .filter(|p| !p.is_empty())
            .or(cred.password);
        let credential = match secret {
            Some(secret) => Credential::new(username, secret),
            None if require_credential => {
                return Err(ConfigError::MissingCredential(PASSWORD_ENV));
            }
            None => {
                warn!(
                    env = PASSWORD_ENV,
                    "no administrative secret supplied, falling back to the default; \
                     set require_credential to refuse this"
                );
                Credential::fallback(username, DEFAULT_PASSWORD)
            }
        };

        let admin = ports.admin.unwrap_or(PortPair {
            external: DEFAULT_ADMIN_PORT,
            internal: DEFAULT_ADMIN_PORT,
        });
        let query = ports.query.unwrap_or(PortPair {
            external: DEFAULT_QUERY_PORT,
            internal: DEFAULT_QUERY_PORT,
        });

        let poll_max_attempts = readiness.max_attempts.unwrap_or(DEFAULT_POLL_MAX_ATTEMPTS);
        if poll_max_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "readiness.max_attempts",
                reason: "must be at least 1".to_string(),
            });
        }
        let poll_interval = duration_field("readiness.interval", readiness.interval, DEFAULT_POLL_INTERVAL)?;
        let call_timeout =
            duration_field("readiness.call_timeout", readiness.call_timeout, DEFAULT_CALL_TIMEOUT)?;
        if poll_interval.is_zero() || call_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                field: "readiness",
                reason: "interval and call_timeout must be positive".to_string(),
            });
        }

        let log_dir = env(LOG_DIR_ENV)
            .filter(|d| !d.is_empty())
            .map(PathBuf::from)
            .or(journal.dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR));

        Ok(Self {
            instance_name: instance
                .name
                .unwrap_or_else(|| DEFAULT_INSTANCE_NAME.to_string()),
            image: instance.image.unwrap_or_else(|| DEFAULT_IMAGE.to_string()),
            credential,
            ports: vec![
                PortMapping::new(PortRole::Admin, admin.external, admin.internal),
                PortMapping::new(PortRole::Query, query.external, query.internal),
            ],
            poll_max_attempts,
            poll_interval,
            call_timeout,
            log_dir,
            data_dir: instance
                .data_dir
                .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string()),
            volumes: instance.volumes.unwrap_or_default(),
            env: instance.env.unwrap_or_default(),
            require_credential,
        })
    }

    /// The instance as the controller addresses it.
    pub fn service_instance(&self) -> ServiceInstance {
        ServiceInstance {
            name: self.instance_name.clone(),
            ports: self.ports.clone(),
            credential: self.credential.clone(),
        }
    }

    /// What the backend is asked to start.
    pub fn instance_spec(&self) -> InstanceSpec {
        let mut env = self.env.clone();
        env.insert("NEO4J_AUTH".to_string(), self.credential.auth_env());
        InstanceSpec {
            name: self.instance_name.clone(),
            image: self.image.clone(),
            ports: self.ports.clone(),
            volumes: self.volumes.clone(),
            env,
        }
    }
}

fn duration_field(
    field: &'static str,
    value: Option<String>,
    default: Duration,
) -> ConfigResult<Duration> {
    match value {
        None => Ok(default),
        Some(v) => parse_duration(&v).ok_or(ConfigError::InvalidDuration { field, value: v }),
    }
}

/// Parse a duration string like "5s", "500ms", "1m".
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s') {
        if let Some(ms) = secs.strip_suffix('m') {
            ms.parse::<u64>().ok().map(Duration::from_millis)
        } else {
            secs.parse::<u64>().ok().map(Duration::from_secs)
        }
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn defaults_without_file_or_env() {
        let config = WardenConfig::resolve(ConfigFile::default(), no_env).unwrap();
        assert_eq!(config.instance_name, "neo4j");
        assert_eq!(config.poll_max_attempts, 30);
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.ports.len(), 2);
        assert!(config.credential.is_default());
        assert_eq!(config.credential.secret(), "password");
    }

    #[test]
    fn env_secret_overrides_default() {
        let config = WardenConfig::resolve(ConfigFile::default(), |k| {
            (k == PASSWORD_ENV).then(|| "hunter2".to_string())
        })
        .unwrap();
        assert!(!config.credential.is_default());
        assert_eq!(config.credential.secret(), "hunter2");
    }

    #[test]
    fn empty_env_secret_is_treated_as_missing() {
        let config = WardenConfig::resolve(ConfigFile::default(), |k| {
            (k == PASSWORD_ENV).then(String::new)
        })
        .unwrap();
        assert!(config.credential.is_default());
    }

    #[test]
    fn require_credential_fails_closed() {
        let file: ConfigFile = toml::from_str("[credential]\nrequire = true\n").unwrap();
        let err = WardenConfig::resolve(file, no_env).unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredential(_)));
    }

    #[test]
    fn parses_full_file() {
        let file: ConfigFile = toml::from_str(
            r#"
[instance]
name = "graph-dev"
image = "neo4j:5.15-community"
volumes = ["/srv/neo4j/data:/data"]

[instance.env]
NEO4J_server_memory_heap_max__size = "1G"

[credential]
username = "admin"

[ports]
admin = { external = 17474, internal = 7474 }
query = { external = 17687, internal = 7687 }

[readiness]
max_attempts = 5
interval = "500ms"
call_timeout = "2s"

[journal]
dir = "/var/log/warden"
"#,
        )
        .unwrap();
        let config = WardenConfig::resolve(file, no_env).unwrap();
        assert_eq!(config.instance_name, "graph-dev");
        assert_eq!(config.credential.username, "admin");
        assert_eq!(config.poll_max_attempts, 5);
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert_eq!(config.call_timeout, Duration::from_secs(2));
        assert_eq!(config.log_dir, PathBuf::from("/var/log/warden"));
        assert_eq!(config.ports[0], PortMapping::new(PortRole::Admin, 17474, 7474));

        let spec = config.instance_spec();
        assert_eq!(spec.env.get("NEO4J_AUTH").map(String::as_str), Some("admin/password"));
        assert_eq!(spec.volumes, vec!["/srv/neo4j/data:/data"]);
    }

    #[test]
    fn zero_attempts_rejected() {
        let file: ConfigFile = toml::from_str("[readiness]\nmax_attempts = 0\n").unwrap();
        assert!(WardenConfig::resolve(file, no_env).is_err());
    }

    #[test]
    fn bad_interval_rejected() {
        let file: ConfigFile = toml::from_str("[readiness]\ninterval = \"soon\"\n").unwrap();
        let err = WardenConfig::resolve(file, no_env).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDuration { .. }));
    }

    #[test]
    fn from_file_reports_path_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warden.toml");
        std::fs::write(&path, "[instance\n").unwrap();
        let err = ConfigFile::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("warden.toml"));
    }

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("5s"), Some(Duration::from_secs(5)));
        assert_eq!(parse_duration("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_duration("2m"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration("10"), Some(Duration::from_secs(10)));
        assert_eq!(parse_duration("ten"), None);
    }

    #[test]
    fn oversized_minutes_rejected() {
        let huge = format!("{}m", u64::MAX / 60 + 1);
        assert_eq!(parse_duration(&huge), None);
        let err = WardenConfig::resolve(
            toml::from_str(&format!("[readiness]\ninterval = \"{huge}\"\n")).unwrap(),
            no_env,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDuration { field: "readiness.interval", .. }));
    }
}
