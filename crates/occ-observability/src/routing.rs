//! A `tracing` layer that fans events out to filtered sinks.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

use crate::logging::{LogEntry, LogFormat, LogLevel};
use crate::sink::LogSink;

/// Which entries a route accepts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RouteFilter {
    /// Every entry.
    #[default]
    All,
    /// Entries at or above a level.
    AtLeast { level: LogLevel },
    /// Entries at exactly one of the listed levels.
    Levels { levels: Vec<LogLevel> },
    /// Entries whose message contains any of the keywords.
    Keywords { keywords: Vec<String> },
}

impl RouteFilter {
    /// Check whether `entry` should be written by this route.
    pub fn matches(&self, entry: &LogEntry) -> bool {
        match self {
            Self::All => true,
            Self::AtLeast { level } => entry.level >= *level,
            Self::Levels { levels } => levels.contains(&entry.level),
            Self::Keywords { keywords } => keywords
                .iter()
                .any(|keyword| entry.message.contains(keyword.as_str())),
        }
    }
}

/// A named filter, output format and sink.
pub struct Route {
    name: String,
    filter: RouteFilter,
    format: LogFormat,
    sink: Arc<dyn LogSink>,
}

impl Route {
    /// Create a route that writes every entry as JSON.
    pub fn new(name: impl Into<String>, sink: impl LogSink + 'static) -> Self {
        Self {
            name: name.into(),
            filter: RouteFilter::All,
            format: LogFormat::Json,
            sink: Arc::new(sink),
        }
    }

    /// Set the filter.
    pub fn with_filter(mut self, filter: RouteFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Set the output format.
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Route name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Route filter.
    pub fn filter(&self) -> &RouteFilter {
        &self.filter
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("name", &self.name)
            .field("filter", &self.filter)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

/// Layer that writes each event to every route whose filter accepts it.
///
/// A failing sink never blocks the other routes. Failures are counted and
/// can be read through the handle returned by [`RoutingLayer::write_errors`].
#[derive(Debug, Default)]
pub struct RoutingLayer {
    routes: Vec<Route>,
    write_errors: Arc<AtomicU64>,
}

impl RoutingLayer {
    /// Create a layer with no routes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a route.
    pub fn with_route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    /// Configured routes.
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Shared counter of failed sink writes.
    pub fn write_errors(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.write_errors)
    }

    /// Write `entry` to every matching route.
    pub fn dispatch(&self, entry: &LogEntry) {
        let mut json = None;
        let mut human = None;

        for route in self.routes.iter().filter(|r| r.filter.matches(entry)) {
            let line: &String = match route.format {
                LogFormat::Json => json.get_or_insert_with(|| entry.to_json()),
                LogFormat::Human => human.get_or_insert_with(|| entry.to_human()),
            };
            if route.sink.write_line(line).is_err() {
                self.write_errors.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

impl<S: Subscriber> Layer<S> for RoutingLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if self.routes.is_empty() {
            return;
        }

        let metadata = event.metadata();
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let mut entry = LogEntry::new(
            LogLevel::from(metadata.level()),
            metadata.target(),
            visitor.message.unwrap_or_default(),
        );
        entry.fields = visitor.fields;
        self.dispatch(&entry);
    }
}

/// Collects the `message` field and all other fields of an event.
#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: BTreeMap<String, serde_json::Value>,
}

impl FieldVisitor {
    fn insert(&mut self, field: &Field, value: serde_json::Value) {
        if field.name() == "message" {
            self.message = Some(match value {
                serde_json::Value::String(text) => text,
                other => other.to_string(),
            });
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, value.into());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, value.into());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, value.into());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, value.into());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, value.into());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.insert(field, value.to_string().into());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, format!("{:?}", value).into());
    }
}
