//! Upgrade a deployment to a new image version.

use anyhow::{Context as _, Result};

use super::{run_cancellable, UpgradeArgs};
use crate::context::Context;
use crate::deployment::image_for;
use crate::ops::{self, DeploymentStatus};

/// Run the upgrade command.
pub async fn run(args: UpgradeArgs, ctx: &Context) -> Result<()> {
    let key = ctx.deployment_key();

    ctx.output.header(&format!("Upgrading deployment {}", key));

    ctx.output.step(1, 3, "Resolving image");
    let image = image_for(&ctx.config.deployment.repository, &args.version)?;
    ctx.output.kv("Image", &image);

    let store = ctx.store()?;
    let retrier = ctx.retrier()?;
    ctx.output.debug(&format!(
        "Retrying conflicts up to {} attempts",
        retrier.policy().max_attempts
    ));

    ctx.output.step(2, 3, "Updating deployment");
    let spinner = ctx.output.spinner(&format!("Setting image to {}", image));
    let result = {
        let key = key.clone();
        let image = image.clone();
        run_cancellable(move |cancel| ops::upgrade(&store, &retrier, &key, &image, &cancel)).await?
    };
    spinner.finish_and_clear();

    let updated = result.with_context(|| format!("Failed to upgrade deployment {}", key))?;

    ctx.output.step(3, 3, "Done");
    if ctx.output.is_json() {
        ctx.output.json(&DeploymentStatus::from(&updated));
    } else {
        ctx.output.success(&format!(
            "Deployment upgraded to version {} (resource version {})",
            args.version.trim(),
            updated.version()
        ));
    }

    Ok(())
}
