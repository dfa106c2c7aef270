use std::process::ExitCode;

use anyhow::Context as _;
use tracing::warn;

use warden_metrics::MetricsCollector;

use super::Context;

pub async fn collect(ctx: Context) -> anyhow::Result<ExitCode> {
    let name = &ctx.config.instance_name;
    let running = match ctx.backend.is_running(name).await {
        Ok(running) => running,
        Err(e) if e.is_environment() => return Err(e).context("cannot query backend"),
        Err(e) => {
            warn!(instance = %name, error = %e, "could not determine running state");
            false
        }
    };
    // Metrics are only recorded for a live instance.
    if !running {
        println!("Instance {name} is not running; no sample recorded.");
        return Ok(ExitCode::SUCCESS);
    }

    let journal = ctx.journal()?;
    let instance = ctx.config.service_instance();
    let collector = MetricsCollector::new(ctx.backend, ctx.probe, &instance, ctx.config.data_dir);
    let record = collector.collect().await.context("metrics collection aborted")?;
    journal.append_metrics(&record)?;

    println!("{}", record.timestamp.human);
    println!("  cpu:        {}", record.cpu_percent);
    println!("  memory:     {} ({})", record.memory_usage, record.memory_percent);
    println!("  network:    {}", record.network_io);
    println!("  block io:   {}", record.block_io);
    println!("  db size:    {}", record.db_size);
    println!("  nodes:      {}", record.node_count);
    println!("  rels:       {}", record.relationship_count);
    Ok(ExitCode::SUCCESS)
}
