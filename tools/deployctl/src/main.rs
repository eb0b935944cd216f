//! deployctl - Manage deployments with conflict-safe updates.
//!
//! Commands:
//! - `deployctl create` - Create a deployment
//! - `deployctl upgrade` - Change the deployed image version
//! - `deployctl scale` - Change the replica count
//! - `deployctl status` - Show the stored deployment
//! - `deployctl config` - Manage configuration
//!
//! Upgrades and scaling read the deployment, change it and write it back,
//! retrying with backoff whenever another writer got there first.

mod commands;
mod config;
mod context;
mod deployment;
mod ops;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{ConfigArgs, CreateArgs, ScaleArgs, StatusArgs, UpgradeArgs};
use context::Overrides;

/// Environment variable holding log directives.
const LOG_ENV: &str = "DEPLOYCTL_LOG";

/// deployctl - Create, upgrade and scale deployments
#[derive(Parser)]
#[command(name = "deployctl")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use JSON output format
    #[arg(long, global = true)]
    json: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// State file path (overrides cluster.state_path)
    #[arg(long, global = true)]
    state: Option<PathBuf>,

    /// Namespace (overrides cluster.namespace)
    #[arg(short, long, global = true)]
    namespace: Option<String>,

    /// Deployment name (overrides deployment.name)
    #[arg(long, global = true)]
    name: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the deployment
    Create(CreateArgs),

    /// Upgrade the deployment to a new version
    Upgrade(UpgradeArgs),

    /// Scale the deployment
    Scale(ScaleArgs),

    /// Show the deployment
    Status(StatusArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup output formatting
    let output = output::Output::new(cli.verbose, cli.json);

    let overrides = Overrides {
        state: cli.state,
        namespace: cli.namespace,
        name: cli.name,
    };
    let ctx = match context::Context::load(cli.config.as_deref(), overrides, output.clone()) {
        Ok(ctx) => ctx,
        Err(e) => {
            output.error(&format!("{:#}", e));
            std::process::exit(1);
        }
    };

    // Console logging only in verbose mode; file routes always apply
    let logging = ctx
        .config
        .logging
        .clone()
        .with_stderr(ctx.config.logging.stderr && ctx.output.is_verbose());
    if let Err(e) = occ_observability::init(&logging, LOG_ENV) {
        ctx.output.warn(&format!("Logging disabled: {}", e));
    }

    // Execute command
    let result = match cli.command {
        Commands::Create(args) => commands::create::run(args, &ctx).await,
        Commands::Upgrade(args) => commands::upgrade::run(args, &ctx).await,
        Commands::Scale(args) => commands::scale::run(args, &ctx).await,
        Commands::Status(args) => commands::status::run(args, &ctx).await,
        Commands::Config(args) => commands::config::run(args, &ctx).await,
    };

    if let Err(e) = result {
        ctx.output.error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
