//! Logging setup.
//!
//! `LOG_LEVEL` feeds the env filter; `LOG_FORMAT=json` switches to a
//! structured output whose records carry `@timestamp` and `message` keys,
//! matching what the log shipper expects.

use std::fmt;

use chrono::Utc;
use tracing::{Event, Subscriber};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

const ENV_LOG_LEVEL: &str = "LOG_LEVEL";
const ENV_LOG_FORMAT: &str = "LOG_FORMAT";

/// Initialises the global subscriber from the environment.
pub fn init() {
    let level = std::env::var(ENV_LOG_LEVEL).unwrap_or_else(|_| "info".to_owned());
    let filter = EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"));

    let json = std::env::var(ENV_LOG_FORMAT)
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .event_format(ShippedJsonFormat)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// One JSON object per record with `@timestamp`/`message` keys.
struct ShippedJsonFormat;

impl<S, N> FormatEvent<S, N> for ShippedJsonFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let mut record = serde_json::Map::new();
        record.insert(
            "@timestamp".to_owned(),
            serde_json::Value::String(Utc::now().to_rfc3339()),
        );
        record.insert(
            "level".to_owned(),
            serde_json::Value::String(event.metadata().level().to_string()),
        );
        record.insert(
            "message".to_owned(),
            serde_json::Value::String(visitor.message),
        );
        for (key, value) in visitor.fields {
            record.insert(key, value);
        }

        writeln!(writer, "{}", serde_json::Value::Object(record))
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    fields: Vec<(String, serde_json::Value)>,
}

impl FieldVisitor {
    fn push(&mut self, field: &tracing::field::Field, value: serde_json::Value) {
        if field.name() == "message" {
            self.message = match value {
                serde_json::Value::String(text) => text,
                other => other.to_string(),
            };
        } else {
            self.fields.push((field.name().to_owned(), value));
        }
    }
}

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        self.push(field, serde_json::Value::String(format!("{value:?}")));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.push(field, serde_json::Value::String(value.to_owned()));
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.push(field, serde_json::Value::from(value));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.push(field, serde_json::Value::from(value));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.push(field, serde_json::Value::from(value));
    }

    fn record_f64(&mut self, field: &tracing::field::Field, value: f64) {
        self.push(field, serde_json::Value::from(value));
    }
}
