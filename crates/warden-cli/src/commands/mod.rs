pub mod collect;
pub mod deploy;
pub mod monitor;
pub mod status;
pub mod stop;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;

use warden_backend::{CypherShellProbe, DockerBackend, HealthProbe, WorkloadBackend};
use warden_core::WardenConfig;
use warden_journal::Journal;

/// Resolved configuration and adapters shared by every command.
pub struct Context {
    pub config: WardenConfig,
    pub backend: Arc<dyn WorkloadBackend>,
    pub probe: Arc<dyn HealthProbe>,
}

impl Context {
    pub fn load(config_path: Option<&Path>, backend_binary: &str) -> anyhow::Result<Self> {
        let config = WardenConfig::load(config_path).context("failed to load configuration")?;
        let backend: Arc<dyn WorkloadBackend> =
            Arc::new(DockerBackend::new(config.call_timeout).with_binary(backend_binary));
        let probe: Arc<dyn HealthProbe> = Arc::new(CypherShellProbe::new(
            backend.clone(),
            config.instance_name.clone(),
        ));
        Ok(Self {
            config,
            backend,
            probe,
        })
    }

    pub fn journal(&self) -> anyhow::Result<Journal> {
        Journal::open(&self.config.log_dir, &self.config.instance_name).with_context(|| {
            format!("cannot open log directory {}", self.config.log_dir.display())
        })
    }
}
