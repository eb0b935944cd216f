//! CLI command implementations.

pub mod config;
pub mod create;
pub mod scale;
pub mod status;
pub mod upgrade;

use anyhow::Result;
use clap::{Args, Subcommand};
use occ_core::CancelToken;

/// Arguments for the create command.
#[derive(Args)]
pub struct CreateArgs {
    /// Number of replicas (default: deployment.replicas from config).
    #[arg(short, long)]
    pub replicas: Option<u32>,

    /// Container image (default: <repository>:latest).
    #[arg(short, long)]
    pub image: Option<String>,
}

/// Arguments for the upgrade command.
#[derive(Args)]
pub struct UpgradeArgs {
    /// Image tag to deploy, appended to the configured repository.
    #[arg(long)]
    pub version: String,
}

/// Arguments for the scale command.
#[derive(Args)]
pub struct ScaleArgs {
    /// Desired number of replicas.
    #[arg(short, long)]
    pub replicas: u32,

    /// Skip confirmation prompt.
    #[arg(short, long)]
    pub yes: bool,
}

/// Arguments for the status command.
#[derive(Args)]
pub struct StatusArgs {}

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration.
    Show,
    /// Initialize a new config file.
    Init {
        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,
    },
    /// Validate the config file.
    Validate,
}

/// Run a blocking retrier call on a worker thread.
///
/// Ctrl-C cancels the token handed to `op`; the call then stops at its next
/// cancellation point and its result is still returned.
pub(crate) async fn run_cancellable<T, F>(op: F) -> Result<T>
where
    F: FnOnce(CancelToken) -> T + Send + 'static,
    T: Send + 'static,
{
    let cancel = CancelToken::new();
    let worker = tokio::task::spawn_blocking({
        let cancel = cancel.clone();
        move || op(cancel)
    });
    tokio::pin!(worker);

    tokio::select! {
        result = &mut worker => Ok(result?),
        Ok(()) = tokio::signal::ctrl_c() => {
            tracing::warn!("interrupt received, cancelling");
            cancel.cancel();
            Ok(worker.await?)
        }
    }
}
