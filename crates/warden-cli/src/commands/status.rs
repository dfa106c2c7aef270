use std::process::ExitCode;

use anyhow::Context as _;

use super::Context;

pub async fn status(ctx: Context, records: usize) -> anyhow::Result<ExitCode> {
    let name = &ctx.config.instance_name;
    let running = ctx
        .backend
        .is_running(name)
        .await
        .context("cannot query backend")?;

    println!("Instance: {name}");
    println!("  running:    {}", if running { "yes" } else { "no" });
    if let Ok(bindings) = ctx.backend.ports_of(name).await {
        for b in bindings {
            println!("  port:       {} -> {}/{}", b.external, b.internal, b.protocol);
        }
    }
    println!("  credential: {}", ctx.config.credential.masked());

    let journal = ctx.journal()?;
    println!("Recent health ({}):", journal.health_path().display());
    for r in journal.tail_health(records)? {
        let detail = match (r.response_time_ms, &r.error) {
            (Some(ms), _) => format!("{ms} ms"),
            (None, Some(e)) => e.clone(),
            (None, None) => String::new(),
        };
        println!("  {}  {:<7} {detail}", r.timestamp.human, r.status.as_str());
    }

    println!("Recent metrics ({}):", journal.metrics_path().display());
    for m in journal.tail_metrics(records)? {
        println!(
            "  {}  cpu {}  mem {}  size {}  nodes {}  rels {}",
            m.timestamp.human, m.cpu_percent, m.memory_usage, m.db_size, m.node_count,
            m.relationship_count
        );
    }
    Ok(ExitCode::SUCCESS)
}
