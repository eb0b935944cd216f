//! Create a deployment.

use anyhow::{Context as _, Result};

use super::CreateArgs;
use crate::context::Context;
use crate::deployment::DeploymentSpec;
use crate::ops::{self, DeploymentStatus};

/// Run the create command.
pub async fn run(args: CreateArgs, ctx: &Context) -> Result<()> {
    let key = ctx.deployment_key();
    let defaults = &ctx.config.deployment;
    let replicas = args.replicas.unwrap_or(defaults.replicas);
    let image = args
        .image
        .unwrap_or_else(|| format!("{}:latest", defaults.repository));

    ctx.output.header(&format!("Creating deployment {}", key));
    ctx.output.kv("Image", &image);
    ctx.output.kv("Replicas", &replicas.to_string());

    let store = ctx.store()?;
    ctx.output
        .debug(&format!("State file: {}", store.path().display()));

    let spec =
        DeploymentSpec::single_container(&defaults.container, image, defaults.port, replicas);
    let created = ops::create(&store, &key, spec)
        .with_context(|| format!("Failed to create deployment {}", key))?;

    if ctx.output.is_json() {
        ctx.output.json(&DeploymentStatus::from(&created));
    } else {
        ctx.output.success(&format!(
            "{} created with {} replicas",
            created.key(),
            created.spec.replicas
        ));
    }

    Ok(())
}
