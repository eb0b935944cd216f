//! Configuration management commands.

use std::fs;

use anyhow::{bail, Result};

use super::{ConfigArgs, ConfigCommand};
use crate::config::{generate_default_config, CONFIG_NAMES};
use crate::context::Context;

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => show_config(ctx).await,
        ConfigCommand::Init { force } => init_config(force, ctx).await,
        ConfigCommand::Validate => validate_config(ctx).await,
    }
}

async fn show_config(ctx: &Context) -> Result<()> {
    if ctx.output.is_json() {
        ctx.output.json(&ctx.config);
        return Ok(());
    }

    ctx.output.header("Current Configuration");
    match &ctx.config_path {
        Some(path) => ctx.output.kv("file", &path.display().to_string()),
        None => ctx.output.kv("file", "<defaults>"),
    }

    let config = &ctx.config;

    ctx.output.info("[cluster]");
    ctx.output
        .kv("state_path", &config.cluster.state_path.display().to_string());
    ctx.output.kv("namespace", &config.cluster.namespace);

    ctx.output.info("[deployment]");
    ctx.output.kv("name", &config.deployment.name);
    ctx.output.kv("repository", &config.deployment.repository);
    ctx.output.kv("container", &config.deployment.container);
    ctx.output.kv("port", &config.deployment.port.to_string());
    ctx.output.kv("replicas", &config.deployment.replicas.to_string());

    ctx.output.info("[retry]");
    ctx.output
        .kv("max_attempts", &config.retry.max_attempts.to_string());
    ctx.output
        .kv("initial_backoff_ms", &config.retry.initial_backoff_ms.to_string());
    ctx.output
        .kv("max_backoff_ms", &config.retry.max_backoff_ms.to_string());
    ctx.output.kv("multiplier", &config.retry.multiplier.to_string());
    ctx.output.kv("jitter", &config.retry.jitter.to_string());
    if let Some(ms) = config.retry.max_elapsed_ms {
        ctx.output.kv("max_elapsed_ms", &ms.to_string());
    }

    ctx.output.info("[logging]");
    ctx.output.kv("level", &config.logging.level);
    ctx.output.kv("stderr", &config.logging.stderr.to_string());
    for route in &config.logging.routes {
        ctx.output.kv(
            &format!("route.{}", route.name),
            &route.path.display().to_string(),
        );
    }

    Ok(())
}

async fn init_config(force: bool, ctx: &Context) -> Result<()> {
    let config_path = ctx.cwd.join(CONFIG_NAMES[0]);

    if config_path.exists() && !force {
        bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    fs::write(&config_path, generate_default_config())?;

    ctx.output
        .success(&format!("Created: {}", config_path.display()));

    Ok(())
}

async fn validate_config(ctx: &Context) -> Result<()> {
    ctx.output.header("Validating configuration");

    let (errors, warnings) = ctx.config.validate();

    if errors.is_empty() && warnings.is_empty() {
        ctx.output.success("Configuration is valid");
        return Ok(());
    }

    for error in &errors {
        ctx.output.error(&format!("Error: {}", error));
    }

    for warning in &warnings {
        ctx.output.warn(&format!("Warning: {}", warning));
    }

    if !errors.is_empty() {
        bail!("Configuration has {} error(s)", errors.len());
    }

    ctx.output.success("Configuration is valid (with warnings)");

    Ok(())
}
