//! Show the state of a deployment.

use anyhow::{Context as _, Result};

use super::StatusArgs;
use crate::context::Context;
use crate::ops;
use crate::output::replicas_badge;

/// Run the status command.
pub async fn run(_args: StatusArgs, ctx: &Context) -> Result<()> {
    let key = ctx.deployment_key();
    let store = ctx.store()?;
    let status = ops::status(&store, &key)
        .with_context(|| format!("Failed to read deployment {}", key))?;

    if ctx.output.is_json() {
        ctx.output.json(&status);
        return Ok(());
    }

    ctx.output.header(&format!("Deployment {}", key));
    ctx.output.kv("Name", &status.name);
    ctx.output.kv("Namespace", &status.namespace);
    ctx.output
        .kv("Image", status.image.as_deref().unwrap_or("<none>"));
    ctx.output.kv("Replicas", &replicas_badge(status.replicas));
    ctx.output
        .kv("Resource version", &status.resource_version.to_string());
    ctx.output.kv("Generation", &status.generation.to_string());

    Ok(())
}
