//! Config-driven global subscriber setup.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::error::ObservabilityError;
use crate::logging::{LogFormat, LogLevel};
use crate::routing::{Route, RouteFilter, RoutingLayer};
use crate::sink::FileSink;

/// Keywords routed to `keyword.log` by [`LoggingConfig::split_files`].
pub const DEFAULT_KEYWORDS: &[&str] = &["important", "critical", "alert"];

/// One file route in the logging config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Route name, used in diagnostics.
    pub name: String,
    /// File the route appends to.
    pub path: PathBuf,
    /// Which entries to write.
    #[serde(default)]
    pub filter: RouteFilter,
    /// Line format, defaulting to the config-wide format.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<LogFormat>,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level directive, overridden by the environment.
    pub level: String,
    /// Default format for file routes.
    pub format: LogFormat,
    /// Also print events to stderr.
    pub stderr: bool,
    /// File routes.
    pub routes: Vec<RouteConfig>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
            stderr: true,
            routes: Vec::new(),
        }
    }
}

impl LoggingConfig {
    /// Routes writing `all.log`, `error.log` and `keyword.log` under `dir`.
    pub fn split_files(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let routes = vec![
            RouteConfig {
                name: "all".to_string(),
                path: dir.join("all.log"),
                filter: RouteFilter::All,
                format: None,
            },
            RouteConfig {
                name: "error".to_string(),
                path: dir.join("error.log"),
                filter: RouteFilter::AtLeast {
                    level: LogLevel::Error,
                },
                format: None,
            },
            RouteConfig {
                name: "keyword".to_string(),
                path: dir.join("keyword.log"),
                filter: RouteFilter::Keywords {
                    keywords: DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
                },
                format: None,
            },
        ];

        Self {
            routes,
            ..Self::default()
        }
    }

    /// Set the default level directive.
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Enable or disable stderr output.
    pub fn with_stderr(mut self, stderr: bool) -> Self {
        self.stderr = stderr;
        self
    }

    /// Open every route's file and build the routing layer.
    pub fn build_layer(&self) -> Result<RoutingLayer, ObservabilityError> {
        self.routes.iter().try_fold(RoutingLayer::new(), |layer, route| {
            let sink = FileSink::open(&route.path)?;
            Ok(layer.with_route(
                Route::new(route.name.clone(), sink)
                    .with_filter(route.filter.clone())
                    .with_format(route.format.unwrap_or(self.format)),
            ))
        })
    }

    /// Build the level filter, preferring `env_var`, then `RUST_LOG`, then `level`.
    ///
    /// The first source that is set and non-empty wins. A malformed value there is an error;
    /// later sources are not consulted.
    pub fn env_filter(&self, env_var: &str) -> Result<EnvFilter, ObservabilityError> {
        let directive = [env_var, EnvFilter::DEFAULT_ENV]
            .into_iter()
            .find_map(|name| std::env::var(name).ok().filter(|v| !v.trim().is_empty()))
            .unwrap_or_else(|| self.level.clone());
        parse_filter(&directive)
    }
}

fn parse_filter(directive: &str) -> Result<EnvFilter, ObservabilityError> {
    EnvFilter::try_new(directive).map_err(|e| ObservabilityError::InvalidFilter {
        directive: directive.to_string(),
        message: e.to_string(),
    })
}

/// Install the global subscriber described by `config`.
///
/// `env_var` names an environment variable whose directives take precedence
/// over `config.level`.
pub fn init(config: &LoggingConfig, env_var: &str) -> Result<(), ObservabilityError> {
    let filter = config.env_filter(env_var)?;
    let routing = config.build_layer()?;
    let stderr = config.stderr.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr)
        .with(routing)
        .try_init()
        .map_err(|_| ObservabilityError::AlreadyInitialized)
}
