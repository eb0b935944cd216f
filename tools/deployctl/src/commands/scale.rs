//! Scale a deployment.

use anyhow::{Context as _, Result};
use dialoguer::Confirm;

use super::{run_cancellable, ScaleArgs};
use crate::context::Context;
use crate::ops::{self, DeploymentStatus};

/// Run the scale command.
pub async fn run(args: ScaleArgs, ctx: &Context) -> Result<()> {
    let key = ctx.deployment_key();
    let replicas = args.replicas;

    ctx.output.header(&format!("Scaling deployment {}", key));
    ctx.output.kv("Replicas", &replicas.to_string());

    if replicas == 0 && !args.yes {
        let confirmed = Confirm::new()
            .with_prompt("Scaling to 0 stops every pod. Continue?")
            .default(false)
            .interact()?;

        if !confirmed {
            ctx.output.warn("Scale cancelled");
            return Ok(());
        }
    }

    let store = ctx.store()?;
    let retrier = ctx.retrier()?;

    let spinner = ctx.output.spinner(&format!("Scaling to {} replicas", replicas));
    let result = {
        let key = key.clone();
        run_cancellable(move |cancel| ops::scale(&store, &retrier, &key, replicas, &cancel)).await?
    };
    spinner.finish_and_clear();

    let updated = result.with_context(|| format!("Failed to scale deployment {}", key))?;

    if ctx.output.is_json() {
        ctx.output.json(&DeploymentStatus::from(&updated));
    } else {
        ctx.output
            .success(&format!("Deployment scaled to {} replicas", updated.spec.replicas));
    }

    Ok(())
}
