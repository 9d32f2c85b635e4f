use crate::record::Level;
use crate::sink::LogSink;
use std::fmt::{self, Write as _};
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

/// Forwards every `tracing` event into a [`LogSink`].
///
/// Lines look like `target: message key=value ...`.
#[derive(Debug, Clone)]
pub struct LogSinkLayer {
    sink: Arc<LogSink>,
    with_target: bool,
}

impl LogSinkLayer {
    pub fn new(sink: Arc<LogSink>) -> Self {
        Self {
            sink,
            with_target: true,
        }
    }

    pub fn with_target(mut self, with_target: bool) -> Self {
        self.with_target = with_target;
        self
    }

    pub fn sink(&self) -> &Arc<LogSink> {
        &self.sink
    }
}

impl<S> Layer<S> for LogSinkLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let mut line = String::with_capacity(visitor.message.len() + visitor.fields.len() + 32);
        if self.with_target {
            line.push_str(metadata.target());
            line.push_str(": ");
        }
        line.push_str(&visitor.message);
        if !visitor.fields.is_empty() {
            if !visitor.message.is_empty() {
                line.push(' ');
            }
            line.push_str(&visitor.fields);
        }

        self.sink.submit(Level::from(metadata.level()), line);
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl MessageVisitor {
    fn push_field(&mut self, name: &str, value: fmt::Arguments<'_>) {
        if !self.fields.is_empty() {
            self.fields.push(' ');
        }
        let _ = write!(self.fields, "{}={}", name, value);
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            self.push_field(field.name(), format_args!("{}", value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{:?}", value);
        } else {
            self.push_field(field.name(), format_args!("{:?}", value));
        }
    }
}
