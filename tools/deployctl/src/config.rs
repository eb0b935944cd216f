//! CLI configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use occ_core::{PolicyError, RetryPolicy};
use occ_observability::LoggingConfig;
use serde::{Deserialize, Serialize};

/// File names searched for when no `--config` is given.
pub const CONFIG_NAMES: &[&str] = &["deployctl.toml", ".deployctl.toml", "deployctl.json"];

/// CLI configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Where deployments are stored.
    #[serde(default)]
    pub cluster: ClusterConfig,

    /// Deployment defaults.
    #[serde(default)]
    pub deployment: DeploymentConfig,

    /// Conflict retry settings.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Log routing.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl CliConfig {
    /// Load config from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        if is_json(path) {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))
        } else {
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
        }
    }

    /// Check the config for errors. Returns `(errors, warnings)`.
    pub fn validate(&self) -> (Vec<String>, Vec<String>) {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if self.cluster.namespace.trim().is_empty() {
            errors.push("cluster.namespace is required".to_string());
        }
        if self.deployment.name.trim().is_empty() {
            errors.push("deployment.name is required".to_string());
        }
        if self.deployment.repository.trim().is_empty() {
            errors.push("deployment.repository is required".to_string());
        }
        if self.deployment.port == 0 {
            errors.push("deployment.port must be non-zero".to_string());
        }
        if let Err(e) = self.retry.to_policy() {
            errors.push(format!("retry: {}", e));
        }
        if self.retry.max_attempts > 100 {
            warnings.push(format!(
                "retry.max_attempts = {} may keep a conflicting update busy for a long time",
                self.retry.max_attempts
            ));
        }
        if self.logging.routes.is_empty() && !self.logging.stderr {
            warnings.push("logging has no routes and stderr is disabled".to_string());
        }

        (errors, warnings)
    }
}

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "json")
}

/// Deployment store location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// State file, relative to the working directory.
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,

    /// Namespace deployments live in.
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

fn default_state_path() -> PathBuf {
    PathBuf::from(".deployctl").join("state.json")
}

fn default_namespace() -> String {
    "default".to_string()
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            state_path: default_state_path(),
            namespace: default_namespace(),
        }
    }
}

/// Deployment defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentConfig {
    /// Deployment name.
    #[serde(default = "default_name")]
    pub name: String,

    /// Image repository that versions are appended to.
    #[serde(default = "default_repository")]
    pub repository: String,

    /// Container name.
    #[serde(default = "default_container")]
    pub container: String,

    /// Container port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Replicas for `create` when `--replicas` is not given.
    #[serde(default = "default_replicas")]
    pub replicas: u32,
}

fn default_name() -> String {
    "nginx-deployment".to_string()
}

fn default_repository() -> String {
    "nginx".to_string()
}

fn default_container() -> String {
    crate::deployment::DEFAULT_CONTAINER.to_string()
}

fn default_port() -> u16 {
    80
}

fn default_replicas() -> u32 {
    1
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            repository: default_repository(),
            container: default_container(),
            port: default_port(),
            replicas: default_replicas(),
        }
    }
}

/// Conflict retry settings, in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub multiplier: f64,
    pub jitter: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_elapsed_ms: Option<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            initial_backoff_ms: duration_ms(policy.initial_backoff),
            max_backoff_ms: duration_ms(policy.max_backoff),
            multiplier: policy.backoff_multiplier,
            jitter: policy.jitter_fraction,
            max_elapsed_ms: None,
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl RetryConfig {
    /// Build a validated retry policy.
    pub fn to_policy(&self) -> Result<RetryPolicy, PolicyError> {
        let mut policy = RetryPolicy::new(self.max_attempts)
            .with_initial_backoff(Duration::from_millis(self.initial_backoff_ms))
            .with_max_backoff(Duration::from_millis(self.max_backoff_ms))
            .with_multiplier(self.multiplier)
            .with_jitter(self.jitter);
        if let Some(ms) = self.max_elapsed_ms {
            policy = policy.with_max_elapsed(Duration::from_millis(ms));
        }
        policy.validate()?;
        Ok(policy)
    }
}

/// Generate a default config file.
pub fn generate_default_config() -> String {
    r#"# deployctl configuration

[cluster]
# State file holding deployments
state_path = ".deployctl/state.json"
namespace = "default"

[deployment]
name = "nginx-deployment"
repository = "nginx"
container = "nginx"
port = 80
replicas = 1

[retry]
# Attempts before giving up on a conflicting update
max_attempts = 5
initial_backoff_ms = 10
max_backoff_ms = 1000
multiplier = 1.0
# Random spread applied to each delay, as a fraction
jitter = 0.1

[logging]
level = "info"
format = "json"
stderr = true

# [[logging.routes]]
# name = "all"
# path = ".deployctl/logs/all.log"
#
# [[logging.routes]]
# name = "error"
# path = ".deployctl/logs/error.log"
# filter = { kind = "at_least", level = "error" }
#
# [[logging.routes]]
# name = "keyword"
# path = ".deployctl/logs/keyword.log"
# filter = { kind = "keywords", keywords = ["important", "critical", "alert"] }
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use occ_observability::RouteFilter;

    #[test]
    fn test_default_config_parses() {
        let config: CliConfig = toml::from_str(&generate_default_config()).unwrap();
        assert_eq!(config.cluster.namespace, "default");
        assert_eq!(config.deployment.name, "nginx-deployment");
        assert_eq!(config.retry, RetryConfig::default());
        assert_eq!(config.retry.to_policy().unwrap(), RetryPolicy::default());
        let (errors, warnings) = config.validate();
        assert!(errors.is_empty(), "{:?}", errors);
        assert!(warnings.is_empty(), "{:?}", warnings);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: CliConfig = toml::from_str("").unwrap();
        assert_eq!(config.cluster.state_path, PathBuf::from(".deployctl/state.json"));
        assert_eq!(config.deployment.repository, "nginx");
        assert_eq!(config.deployment.port, 80);
        assert!(config.logging.routes.is_empty());
    }

    #[test]
    fn test_partial_retry_section() {
        let config: CliConfig = toml::from_str(
            r#"
            [retry]
            max_attempts = 10
            max_elapsed_ms = 250
            "#,
        )
        .unwrap();
        let policy = config.retry.to_policy().unwrap();
        assert_eq!(policy.max_attempts, 10);
        assert_eq!(policy.initial_backoff, Duration::from_millis(10));
        assert_eq!(policy.max_elapsed, Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_invalid_retry_is_reported() {
        let mut config = CliConfig::default();
        config.retry.max_attempts = 0;
        config.deployment.name = String::new();

        let (errors, _) = config.validate();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|e| e.starts_with("retry:")));
        assert!(matches!(config.retry.to_policy(), Err(PolicyError::ZeroAttempts)));
    }

    #[test]
    fn test_load_picks_format_from_extension() {
        let dir = tempfile::tempdir().unwrap();

        let toml_path = dir.path().join("deployctl.toml");
        std::fs::write(&toml_path, "[cluster]\nnamespace = \"staging\"\n").unwrap();
        assert_eq!(CliConfig::load(&toml_path).unwrap().cluster.namespace, "staging");

        let json_path = dir.path().join("deployctl.json");
        std::fs::write(
            &json_path,
            r#"{"cluster": {"namespace": "staging"}, "retry": {"max_attempts": 9}}"#,
        )
        .unwrap();
        let config = CliConfig::load(&json_path).unwrap();
        assert_eq!(config.cluster.namespace, "staging");
        assert_eq!(config.retry.max_attempts, 9);
        assert_eq!(config.deployment.name, "nginx-deployment");

        // TOML content under a .json name is a parse error, not a silent default.
        std::fs::write(&json_path, "[cluster]\n").unwrap();
        let err = CliConfig::load(&json_path).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse JSON config"));
    }

    #[test]
    fn test_logging_routes_in_toml() {
        let config: CliConfig = toml::from_str(
            r#"
            [[logging.routes]]
            name = "keyword"
            path = "logs/keyword.log"
            filter = { kind = "keywords", keywords = ["alert"] }
            "#,
        )
        .unwrap();
        assert_eq!(
            config.logging.routes[0].filter,
            RouteFilter::Keywords {
                keywords: vec!["alert".to_string()]
            }
        );
    }
}
