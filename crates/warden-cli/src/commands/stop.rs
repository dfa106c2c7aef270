use std::process::ExitCode;

use anyhow::Context as _;

use warden_deploy::{Teardown, teardown};

use super::Context;

pub async fn stop(ctx: Context) -> anyhow::Result<ExitCode> {
    let name = &ctx.config.instance_name;
    match teardown(ctx.backend.as_ref(), name)
        .await
        .context("stop aborted")?
    {
        Teardown::Absent => {
            println!("No instance named {name}.");
            Ok(ExitCode::SUCCESS)
        }
        Teardown::Removed => {
            println!("✓ Stopped and removed {name}");
            Ok(ExitCode::SUCCESS)
        }
        Teardown::Incomplete(reason) => {
            eprintln!("Could not remove {name}: {reason}");
            Ok(ExitCode::FAILURE)
        }
    }
}
