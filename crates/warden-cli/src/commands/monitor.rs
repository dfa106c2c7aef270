use std::io::{IsTerminal, Write};
use std::process::ExitCode;

use anyhow::Context as _;

use warden_health::{HealthMonitor, MonitorReport};

use super::Context;

pub async fn monitor(ctx: Context) -> anyhow::Result<ExitCode> {
    let mut stdout = std::io::stdout();
    // Quiet under cron; the journal is the record.
    let interactive = stdout.is_terminal();
    run(ctx, interactive, &mut stdout).await?;
    Ok(ExitCode::SUCCESS)
}

/// One check, journaled; the report is written to `out` only when
/// `interactive`.
async fn run(ctx: Context, interactive: bool, out: &mut impl Write) -> anyhow::Result<()> {
    let journal = ctx.journal()?;
    let instance = ctx.config.service_instance();
    let monitor = HealthMonitor::new(
        ctx.backend,
        ctx.probe,
        instance,
        ctx.config.data_dir.clone(),
        journal,
    );
    let report = monitor.check_once().await.context("health check aborted")?;
    if interactive {
        print_report(&report, out)?;
    }
    Ok(())
}

fn print_report(report: &MonitorReport, out: &mut impl Write) -> std::io::Result<()> {
    let health = &report.health;
    writeln!(out, "{}  {}", health.timestamp.human, health.status)?;
    if let Some(ms) = health.response_time_ms {
        writeln!(out, "  response time: {ms} ms")?;
    }
    if let Some(error) = &health.error {
        writeln!(out, "  error:         {error}")?;
    }
    if let Some(m) = &report.metrics {
        writeln!(out, "  cpu:           {}", m.cpu_percent)?;
        writeln!(out, "  memory:        {} ({})", m.memory_usage, m.memory_percent)?;
        writeln!(out, "  db size:       {}", m.db_size)?;
        writeln!(
            out,
            "  graph:         {} nodes, {} relationships",
            m.node_count, m.relationship_count
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use warden_backend::{MockBackend, ScriptedProbe};
    use warden_journal::HealthStatus;

    use super::*;
    use crate::commands::tests::test_context;

    #[tokio::test]
    async fn silent_when_not_interactive() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(
            dir.path(),
            Arc::new(MockBackend::new().with_running("neo4j")),
            Arc::new(ScriptedProbe::healthy()),
        );
        let journal = ctx.journal().unwrap();

        let mut out = Vec::new();
        run(ctx, false, &mut out).await.unwrap();

        assert!(out.is_empty());
        assert_eq!(journal.tail_health(5).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn down_instance_is_reported_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(
            dir.path(),
            Arc::new(MockBackend::new()),
            Arc::new(ScriptedProbe::healthy()),
        );
        let journal = ctx.journal().unwrap();

        let mut out = Vec::new();
        run(ctx, true, &mut out).await.unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("DOWN"));
        assert!(text.contains("instance not running"));
        assert_eq!(journal.tail_health(1).unwrap()[0].status, HealthStatus::Down);
    }

    #[tokio::test]
    async fn missing_backend_binary_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(
            dir.path(),
            Arc::new(MockBackend::new().missing_binary()),
            Arc::new(ScriptedProbe::healthy()),
        );
        let mut out = Vec::new();
        assert!(run(ctx, true, &mut out).await.is_err());
        assert!(out.is_empty());
    }
}
