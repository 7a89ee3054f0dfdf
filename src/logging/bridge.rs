//! Forwarding of `tracing` events into a [`Logger`].
//!
//! Libraries in the HTTP stack (axum, tower-http) report through `tracing`.
//! Installing [`LoggerLayer`] in a subscriber makes those events land in the
//! same sinks, with the same encoder, as the service's own records.

use std::fmt;

use tracing::field::{Field as TracingField, Visit};
use tracing::{Event, Metadata, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use crate::logging::encoder::Caller;
use crate::logging::field::{Field, Fields, Value};
use crate::logging::level::Level;
use crate::logging::logger::Logger;

/// A `tracing_subscriber` layer that emits every event through a [`Logger`].
///
/// `TRACE` events map to `Debug`. The event target becomes the record name,
/// prefixed by the logger's own name when it has one.
#[derive(Debug, Clone)]
pub struct LoggerLayer {
    logger: Logger,
}

impl LoggerLayer {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }
}

impl<S: Subscriber> Layer<S> for LoggerLayer {
    fn enabled(&self, metadata: &Metadata<'_>, _ctx: Context<'_, S>) -> bool {
        self.logger.enabled(Level::from(*metadata.level()))
    }

    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        let level = Level::from(*meta.level());
        if !self.logger.enabled(level) {
            return;
        }

        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);

        let name = match self.logger.name() {
            Some(prefix) => format!("{}.{}", prefix, meta.target()),
            None => meta.target().to_string(),
        };
        let caller = meta
            .file()
            .zip(meta.line())
            .map(|(file, line)| Caller { file, line });

        self.logger
            .emit(level, &visitor.message, Some(name.as_str()), caller, visitor.fields.as_slice());
    }
}

#[derive(Default)]
struct EventVisitor {
    message: String,
    fields: Fields,
}

impl EventVisitor {
    fn push(&mut self, field: &TracingField, value: Value) {
        self.fields.push(Field::new(field.name(), value));
    }
}

impl Visit for EventVisitor {
    fn record_f64(&mut self, field: &TracingField, value: f64) {
        self.push(field, Value::F64(value));
    }

    fn record_i64(&mut self, field: &TracingField, value: i64) {
        self.push(field, Value::I64(value));
    }

    fn record_u64(&mut self, field: &TracingField, value: u64) {
        self.push(field, Value::U64(value));
    }

    fn record_bool(&mut self, field: &TracingField, value: bool) {
        self.push(field, Value::Bool(value));
    }

    fn record_str(&mut self, field: &TracingField, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.push(field, Value::from(value));
        }
    }

    fn record_error(&mut self, field: &TracingField, value: &(dyn std::error::Error + 'static)) {
        self.push(field, Value::error(value));
    }

    fn record_debug(&mut self, field: &TracingField, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.push(field, Value::Str(format!("{:?}", value)));
        }
    }
}
