use std::io::Write;
use std::process::ExitCode;

use anyhow::Context as _;

use warden_deploy::{DeploymentOutcome, Deployer};

use super::Context;

pub async fn deploy(ctx: Context) -> anyhow::Result<ExitCode> {
    let deployed = run(ctx, &mut std::io::stdout(), &mut std::io::stderr()).await?;
    Ok(if deployed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Deploy and report; returns whether the instance was deployed.
async fn run(ctx: Context, out: &mut impl Write, err: &mut impl Write) -> anyhow::Result<bool> {
    let journal = ctx.journal()?;
    let deployer = Deployer::new(ctx.config, ctx.backend, ctx.probe).with_journal(journal);
    let outcome = deployer.run().await.context("deployment aborted")?;

    match &outcome.summary {
        Some(summary) => {
            writeln!(out, "✓ Deployed")?;
            write!(out, "{summary}")?;
            Ok(true)
        }
        None => {
            print_failure(&outcome, err)?;
            Ok(false)
        }
    }
}

fn print_failure(outcome: &DeploymentOutcome, err: &mut impl Write) -> std::io::Result<()> {
    writeln!(
        err,
        "Deployment failed: {}",
        outcome.failure.as_deref().unwrap_or("unknown reason")
    )?;
    if let Some(checklist) = &outcome.checklist {
        for r in &checklist.results {
            let mark = if r.passed { "✓" } else { "✗" };
            writeln!(
                err,
                "  {mark} {:<26} {}",
                r.name(),
                r.detail.as_deref().unwrap_or("")
            )?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use warden_backend::{MockBackend, ScriptedProbe};

    use super::*;
    use crate::commands::tests::test_context;

    #[tokio::test(start_paused = true)]
    async fn deployed_prints_summary() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(
            dir.path(),
            Arc::new(MockBackend::new()),
            Arc::new(ScriptedProbe::healthy()),
        );
        let (mut out, mut err) = (Vec::new(), Vec::new());

        assert!(run(ctx, &mut out, &mut err).await.unwrap());
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Deployment summary"));
        assert!(!text.contains("cli-secret"));
        assert!(err.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_deploy_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(
            dir.path(),
            Arc::new(MockBackend::new().unpublish(7687)),
            Arc::new(ScriptedProbe::healthy()),
        );
        let (mut out, mut err) = (Vec::new(), Vec::new());

        assert!(!run(ctx, &mut out, &mut err).await.unwrap());
        assert!(out.is_empty());
        let text = String::from_utf8(err).unwrap();
        assert!(text.contains("Deployment failed: verification failed: query-port-exposed"));
        assert!(text.contains("✗ query-port-exposed"));
    }
}
