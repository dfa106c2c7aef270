//! Human-readable record of a successful deployment.

use std::fmt;
use std::path::PathBuf;

use warden_core::{PortMapping, ServiceInstance};
use warden_journal::{Field, MetricsRecord};

#[derive(Debug, Clone)]
pub struct DeploymentSummary {
    pub instance: String,
    pub ports: Vec<PortMapping>,
    pub access_uris: Vec<String>,
    pub username: String,
    /// `user / ********`, with ` (default)` appended for the fallback secret.
    pub credential: String,
    pub default_credential: bool,
    pub log_dir: PathBuf,
    pub first_sample: Option<MetricsRecord>,
}

impl DeploymentSummary {
    pub fn new(
        instance: &ServiceInstance,
        log_dir: impl Into<PathBuf>,
        first_sample: Option<MetricsRecord>,
    ) -> Self {
        Self {
            instance: instance.name.clone(),
            ports: instance.ports.clone(),
            access_uris: instance.access_uris(),
            username: instance.credential.username.clone(),
            credential: instance.credential.masked(),
            default_credential: instance.credential.is_default(),
            log_dir: log_dir.into(),
            first_sample,
        }
    }
}

impl fmt::Display for DeploymentSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Deployment summary")?;
        writeln!(f, "  instance:    {}", self.instance)?;
        for port in &self.ports {
            writeln!(
                f,
                "  {:<12} {} -> {}",
                format!("{} port:", port.role),
                port.external,
                port.internal
            )?;
        }
        for uri in &self.access_uris {
            writeln!(f, "  access:      {uri}")?;
        }
        writeln!(f, "  credential:  {}", self.credential)?;
        if self.default_credential {
            writeln!(f, "  warning:     default credential in use; set NEO4J_PASSWORD")?;
        }
        writeln!(f, "  logs:        {}", self.log_dir.display())?;
        if let Some(m) = &self.first_sample {
            let cpu = match m.cpu_percent {
                Field::Available(v) => format!("{v:.2}%"),
                Field::Unavailable => "N/A".to_string(),
            };
            writeln!(f, "  cpu:         {cpu}")?;
            writeln!(f, "  memory:      {}", m.memory_usage)?;
            writeln!(f, "  db size:     {}", m.db_size)?;
            writeln!(
                f,
                "  graph:       {} nodes, {} relationships",
                m.node_count,
                m.relationship_count
            )?;
        }
        Ok(())
    }
}
