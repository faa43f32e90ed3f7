use crate::gelf::{local_hostname, LoggerLevel};
use crate::record::LogRecord;
use crate::stream::GelfStream;
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// `tracing_subscriber` layer that turns events into leveled-logger
/// records and writes them to a [`GelfStream`].
///
/// Events emitted by this crate itself are skipped so that a failing
/// transport cannot feed its own warnings back into the stream.
pub struct GelfLayer {
    stream: GelfStream,
    name: String,
    max_level: Level,
}

impl GelfLayer {
    /// **Parameters**
    /// - `stream`: destination of the records.
    /// - `name`: application name, sent as the record's `name` (GELF
    ///   `facility`).
    /// - `max_level`: most verbose level forwarded, e.g. `Level::INFO`
    ///   drops `DEBUG` and `TRACE` events.
    pub fn new(stream: GelfStream, name: impl Into<String>, max_level: Level) -> Self {
        Self {
            stream,
            name: name.into(),
            max_level,
        }
    }
}

/// Leveled-logger number for a `tracing` level.
pub fn logger_level(level: &Level) -> LoggerLevel {
    match *level {
        Level::TRACE => LoggerLevel::Trace,
        Level::DEBUG => LoggerLevel::Debug,
        Level::INFO => LoggerLevel::Info,
        Level::WARN => LoggerLevel::Warn,
        Level::ERROR => LoggerLevel::Error,
    }
}

/// Whether `target` belongs to this crate: the crate root or one of its
/// modules, but not another crate whose name merely starts the same way.
fn is_own_target(target: &str) -> bool {
    target == env!("CARGO_CRATE_NAME")
        || target.starts_with(concat!(env!("CARGO_CRATE_NAME"), "::"))
}

impl<S> Layer<S> for GelfLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if *meta.level() > self.max_level || is_own_target(meta.target()) {
            return;
        }

        let mut record = LogRecord::new();
        let mut message: Option<String> = None;
        let mut visitor = FieldVisitor { fields: &mut record, message: &mut message };
        event.record(&mut visitor);

        record.insert("v".to_string(), json!(0));
        record.insert("name".to_string(), json!(self.name));
        record.insert("hostname".to_string(), json!(local_hostname()));
        record.insert("pid".to_string(), json!(std::process::id()));
        record.insert("level".to_string(), json!(logger_level(meta.level()).as_number()));
        record.insert("time".to_string(), json!(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)));
        record.insert("target".to_string(), json!(meta.target()));
        if let Some(msg) = message {
            record.insert("msg".to_string(), json!(msg));
        }
        if let Some(file) = meta.file() {
            let mut src = serde_json::Map::new();
            src.insert("file".to_string(), json!(file));
            if let Some(line) = meta.line() {
                src.insert("line".to_string(), json!(line));
            }
            if let Some(module) = meta.module_path() {
                src.insert("func".to_string(), json!(module));
            }
            record.insert("src".to_string(), Value::Object(src));
        }

        // a closed stream refuses the write; nothing else to do here
        let _ = self.stream.write(Value::Object(record));
    }
}

struct FieldVisitor<'a> {
    fields: &'a mut LogRecord,
    message: &'a mut Option<String>,
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            *self.message = Some(value.to_string());
        } else {
            self.fields.insert(field.name().to_string(), Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        let mut err = serde_json::Map::new();
        err.insert("message".to_string(), Value::String(value.to_string()));
        err.insert("stack".to_string(), Value::String(format!("{:?}", value)));
        self.fields.insert(field.name().to_string(), Value::Object(err));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            *self.message = Some(format!("{:?}", value));
        } else {
            self.fields.insert(field.name().to_string(), Value::String(format!("{:?}", value)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gelf::GelfMessage;
    use crate::transport::GelfTransport;
    use async_trait::async_trait;
    use std::error::Error;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::Registry;

    #[derive(Default)]
    struct Capture {
        messages: Mutex<Vec<GelfMessage>>,
    }

    #[async_trait]
    impl GelfTransport for Capture {
        async fn emit(&self, _event: &str, message: &GelfMessage) -> Result<(), Box<dyn Error + Send + Sync>> {
            self.messages.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    #[derive(Debug)]
    struct Boom;

    impl std::fmt::Display for Boom {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("boom")
        }
    }

    impl Error for Boom {}

    #[tokio::test]
    async fn events_become_gelf_messages() {
        let capture = Arc::new(Capture::default());
        let stream = GelfStream::new(capture.clone());
        let subscriber = Registry::default().with(GelfLayer::new(stream.clone(), "checkout", Level::INFO));

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(target: "checkout", user = "eric", attempts = 3, "hello {}", "world");
            tracing::debug!(target: "checkout", "too verbose, dropped");
        });
        stream.end(None).await;

        let messages = capture.messages.lock().unwrap();
        assert_eq!(messages.len(), 1);
        let gelf = &messages[0];
        assert_eq!(gelf.get("short_message"), Some(&json!("hello world")));
        assert_eq!(gelf.get("facility"), Some(&json!("checkout")));
        assert_eq!(gelf.get("level"), Some(&json!(6)));
        assert_eq!(gelf.get("_level"), Some(&json!(30)));
        assert_eq!(gelf.get("_user"), Some(&json!("eric")));
        assert_eq!(gelf.get("_attempts"), Some(&json!(3)));
        assert_eq!(gelf.get("host"), Some(&json!(local_hostname())));
        assert!(gelf.get("file").is_some());
        assert!(gelf.get("line").is_some());
    }

    #[tokio::test]
    async fn errors_fill_full_message() {
        let capture = Arc::new(Capture::default());
        let stream = GelfStream::new(capture.clone());
        let subscriber = Registry::default().with(GelfLayer::new(stream.clone(), "checkout", Level::INFO));

        tracing::subscriber::with_default(subscriber, || {
            let err = Boom;
            tracing::error!(target: "checkout", err = &err as &(dyn Error + 'static), "payment failed");
        });
        stream.end(None).await;

        let messages = capture.messages.lock().unwrap();
        let gelf = &messages[0];
        assert_eq!(gelf.get("short_message"), Some(&json!("payment failed\nboom")));
        assert_eq!(gelf.get("full_message"), Some(&json!("payment failed\nBoom")));
        assert_eq!(gelf.get("level"), Some(&json!(3)));
        assert_eq!(gelf.get("_err.message"), Some(&json!("boom")));
    }

    #[test]
    fn only_this_crates_targets_are_skipped() {
        assert!(is_own_target("gelf_log_sink"));
        assert!(is_own_target("gelf_log_sink::stream"));
        assert!(!is_own_target("gelf_log_sink_ext"));
        assert!(!is_own_target("gelf_log_sink_ext::worker"));
        assert!(!is_own_target("checkout"));
    }

    #[test]
    fn tracing_levels_map_to_logger_levels() {
        assert_eq!(logger_level(&Level::TRACE).as_number(), 10);
        assert_eq!(logger_level(&Level::DEBUG).as_number(), 20);
        assert_eq!(logger_level(&Level::INFO).as_number(), 30);
        assert_eq!(logger_level(&Level::WARN).as_number(), 40);
        assert_eq!(logger_level(&Level::ERROR).as_number(), 50);
    }
}
