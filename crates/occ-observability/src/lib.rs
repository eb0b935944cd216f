//! Log routing and subscriber setup.
//!
//! This crate provides:
//! - `LogEntry` / `LogLevel` / `LogFormat` - Structured log lines in JSON or human form
//! - `RoutingLayer` - `tracing` layer sending each line to every matching route
//! - `FileSink` / `MemorySink` - Route destinations
//! - `LoggingConfig` / `init` - Config-driven global subscriber setup

mod error;
mod logging;
mod routing;
mod sink;
mod subscriber;

pub use error::*;
pub use logging::*;
pub use routing::*;
pub use sink::*;
pub use subscriber::*;
