//! Observability error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while setting up logging.
#[derive(Error, Debug)]
pub enum ObservabilityError {
    /// The level directive could not be parsed.
    #[error("Invalid log filter '{directive}': {message}")]
    InvalidFilter {
        /// Directive that failed to parse.
        directive: String,
        /// Parser message.
        message: String,
    },

    /// A route's log file could not be opened.
    #[error("Failed to open log sink {}: {source}", path.display())]
    Sink {
        /// Log file path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A global subscriber is already installed.
    #[error("Logging already initialized")]
    AlreadyInitialized,
}
