use std::fmt::{self, Write as _};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Name of the span the forwarding task runs in. Events inside it are never
/// forwarded again.
pub const FORWARDING_SPAN: &str = "log_forwarding";

#[derive(Debug, Clone, Copy, Default)]
pub struct LogOptions {
    pub verbose: bool,
    pub silent: bool,
    pub no_color: bool,
}

fn default_directive(options: &LogOptions) -> &'static str {
    if options.silent {
        "error"
    } else if options.verbose {
        "elastic_pusher=debug,info"
    } else {
        "elastic_pusher=info"
    }
}

/// One formatted log line on its way to the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardedLog {
    pub entry: String,
    pub level: String,
}

/// Layer that copies every event at or above `max_level` into a channel.
pub struct ForwardLayer {
    sender: UnboundedSender<ForwardedLog>,
    max_level: Level,
}

impl ForwardLayer {
    pub fn new(max_level: Level) -> (Self, UnboundedReceiver<ForwardedLog>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender, max_level }, receiver)
    }
}

#[derive(Default)]
struct EntryVisitor {
    message: String,
    fields: String,
}

impl Visit for EntryVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{:?}", value);
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}

impl<S> Layer<S> for ForwardLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let level = *event.metadata().level();
        // TRACE > DEBUG > ... > ERROR
        if level > self.max_level {
            return;
        }
        if let Some(scope) = ctx.event_scope(event) {
            if scope.into_iter().any(|span| span.name() == FORWARDING_SPAN) {
                return;
            }
        }

        let mut visitor = EntryVisitor::default();
        event.record(&mut visitor);
        visitor.message.push_str(&visitor.fields);

        // receiver gone means forwarding already stopped
        let _ = self.sender.send(ForwardedLog {
            entry: visitor.message,
            level: level.to_string(),
        });
    }
}

pub fn init_cli_logger(options: LogOptions, forward: Option<ForwardLayer>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(&options)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .with_ansi(!options.no_color)
                .compact(),
        )
        .with(forward)
        .init();
}

/// JSON lines on stdout, for running under a log collector.
pub fn init_json_logger(options: LogOptions, forward: Option<ForwardLayer>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(&options)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .json(),
        )
        .with(forward)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_wins_over_verbose() {
        let options = LogOptions {
            verbose: true,
            silent: true,
            no_color: false,
        };
        assert_eq!(default_directive(&options), "error");
    }

    #[test]
    fn test_verbose_enables_debug() {
        let options = LogOptions {
            verbose: true,
            ..Default::default()
        };
        assert_eq!(default_directive(&options), "elastic_pusher=debug,info");
        assert_eq!(default_directive(&LogOptions::default()), "elastic_pusher=info");
    }

    #[test]
    fn test_forward_layer_respects_max_level() {
        let (layer, mut logs) = ForwardLayer::new(Level::WARN);
        let subscriber = tracing_subscriber::registry().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("connected");
            tracing::warn!(attempt = 2, "disk almost full");
            tracing::error!("gave up");
        });

        assert_eq!(
            logs.try_recv().unwrap(),
            ForwardedLog {
                entry: "disk almost full attempt=2".to_string(),
                level: "WARN".to_string(),
            }
        );
        assert_eq!(logs.try_recv().unwrap().level, "ERROR");
        assert!(logs.try_recv().is_err());
    }

    #[test]
    fn test_events_inside_forwarding_span_are_not_forwarded() {
        let (layer, mut logs) = ForwardLayer::new(Level::TRACE);
        let subscriber = tracing_subscriber::registry().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            let span = tracing::error_span!("log_forwarding");
            let _entered = span.enter();
            tracing::error!("Pushing failed: [503] unavailable");
        });

        assert!(logs.try_recv().is_err());
    }
}
