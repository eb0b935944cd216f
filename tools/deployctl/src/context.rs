//! CLI execution context.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use occ_core::{ConflictRetrier, RetryPolicy};
use occ_store::{FileStore, ObjectKey};

use crate::config::{CliConfig, CONFIG_NAMES};
use crate::deployment::DeploymentSpec;
use crate::output::Output;

/// Command-line overrides applied on top of the config file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub state: Option<PathBuf>,
    pub namespace: Option<String>,
    pub name: Option<String>,
}

/// Execution context for CLI commands.
pub struct Context {
    /// CLI configuration.
    pub config: CliConfig,
    /// File the configuration was loaded from.
    pub config_path: Option<PathBuf>,
    /// Output handler.
    pub output: Output,
    /// Working directory.
    pub cwd: PathBuf,
}

impl Context {
    /// Load context from config file.
    pub fn load(config_path: Option<&Path>, overrides: Overrides, output: Output) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current directory")?;
        Self::load_in(cwd, config_path, overrides, output)
    }

    /// Load context rooted at `cwd`.
    pub fn load_in(
        cwd: PathBuf,
        config_path: Option<&Path>,
        overrides: Overrides,
        output: Output,
    ) -> Result<Self> {
        let (mut config, config_path) = match config_path {
            Some(path) => (CliConfig::load(path)?, Some(path.to_path_buf())),
            None => match find_config(&cwd) {
                Some(path) => (CliConfig::load(&path)?, Some(path)),
                None => (CliConfig::default(), None),
            },
        };

        if let Some(state) = overrides.state {
            config.cluster.state_path = state;
        }
        if let Some(namespace) = overrides.namespace {
            config.cluster.namespace = namespace;
        }
        if let Some(name) = overrides.name {
            config.deployment.name = name;
        }

        Ok(Self {
            config,
            config_path,
            output,
            cwd,
        })
    }

    /// Key of the deployment commands act on.
    pub fn deployment_key(&self) -> ObjectKey {
        ObjectKey::new(
            self.config.cluster.namespace.clone(),
            self.config.deployment.name.clone(),
        )
    }

    /// Open the deployment store.
    pub fn store(&self) -> Result<FileStore<DeploymentSpec>> {
        let path = self.resolve_path(&self.config.cluster.state_path);
        FileStore::open(&path)
            .with_context(|| format!("Failed to open state file: {}", path.display()))
    }

    /// Retry policy from the config.
    pub fn retry_policy(&self) -> Result<RetryPolicy> {
        self.config
            .retry
            .to_policy()
            .context("Invalid [retry] configuration")
    }

    /// Retrier using the configured policy.
    pub fn retrier(&self) -> Result<ConflictRetrier> {
        Ok(ConflictRetrier::new(self.retry_policy()?)?)
    }

    /// Resolve a path relative to the working directory.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.join(path)
        }
    }
}

/// Find a config file in `start` or its parents.
fn find_config(start: &Path) -> Option<PathBuf> {
    start.ancestors().find_map(|dir| {
        CONFIG_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
    })
}
