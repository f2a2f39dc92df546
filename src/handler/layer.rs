//! Tracing layer that ships log events to InfluxDB
//!
//! Every event becomes one [`Point`] queued on an [`AsyncWriter`]. Events
//! from this crate and from the HTTP stack underneath it are skipped, or
//! writing a batch would itself produce more events to write.

use super::point::Point;
use super::writer::AsyncWriter;
use crate::config::{PointStyleKind, WriterConfig};
use crate::record::LEVEL_TAG;
use chrono::{DateTime, Utc};
use std::fmt;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Metadata, Subscriber};
use tracing_subscriber::{layer::Context, registry::LookupSpan, Layer};

const DEFAULT_IGNORED_TARGETS: &[&str] =
    &[env!("CARGO_CRATE_NAME"), "reqwest", "hyper", "hyper_util", "h2", "rustls"];

/// Event field naming the kind of `error` attached to an event
pub const ERROR_TYPE_FIELD: &str = "error_type";

const DEFAULT_EXCEPTION_TYPE: &str = "Error";

/// Shape of the points written for each event
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PointStyle {
    /// Tags: logger, level, level_number, filename, line_number, module
    #[default]
    Structured,
    /// A pre-formatted `[time] [LEVEL] target: message` line, tagged with
    /// the bot name and optional shard id. Events with an `error` field
    /// also get an `exception_type` tag, taken from `error_type`.
    Prefixed {
        bot: String,
        shard_id: Option<String>,
    },
}

impl PointStyle {
    pub fn from_config(config: &WriterConfig) -> Self {
        match config.style {
            PointStyleKind::Structured => PointStyle::Structured,
            PointStyleKind::Prefixed => PointStyle::Prefixed {
                bot: config.bot.clone().unwrap_or_default(),
                shard_id: config.shard_id.clone(),
            },
        }
    }
}

pub struct InfluxLayer {
    writer: AsyncWriter,
    measurement: String,
    style: PointStyle,
    ignored_targets: Vec<String>,
}

impl InfluxLayer {
    pub fn new(writer: AsyncWriter, measurement: impl Into<String>, style: PointStyle) -> Self {
        Self {
            writer,
            measurement: measurement.into(),
            style,
            ignored_targets: DEFAULT_IGNORED_TARGETS
                .iter()
                .map(|t| t.to_string())
                .collect(),
        }
    }

    /// Also skip events whose target is `target` or one of its submodules
    pub fn with_ignored_target(mut self, target: impl Into<String>) -> Self {
        self.ignored_targets.push(target.into());
        self
    }

    fn is_ignored(&self, target: &str) -> bool {
        self.ignored_targets.iter().any(|ignored| {
            target == ignored
                || target
                    .strip_prefix(ignored.as_str())
                    .is_some_and(|rest| rest.starts_with("::"))
        })
    }

    fn build_point(
        &self,
        metadata: &Metadata<'_>,
        mut fields: EventFields,
        timestamp: DateTime<Utc>,
    ) -> Point {
        let level = metadata.level();
        let target = metadata.target();
        let mut point = Point::new(&self.measurement).timestamp(timestamp);

        let message = match &self.style {
            PointStyle::Structured => {
                point = point
                    .tag("logger", target)
                    .tag(LEVEL_TAG, level.to_string())
                    .tag("level_number", level_number(level).to_string())
                    .tag("filename", metadata.file().map(basename).unwrap_or_default())
                    .tag(
                        "line_number",
                        metadata.line().map(|l| l.to_string()).unwrap_or_default(),
                    )
                    .tag("module", metadata.module_path().unwrap_or_default());

                if let Some(error) = fields.error {
                    point = point.tag("error", error);
                }
                fields.message
            }
            PointStyle::Prefixed { bot, shard_id } => {
                point = point
                    .tag("bot", bot.as_str())
                    .tag("shard_id", shard_id.clone().unwrap_or_default())
                    .tag(LEVEL_TAG, level.to_string());

                let mut message = format!(
                    "[{}] [{:<8}] {}: {}",
                    timestamp.format("%Y-%m-%d %H:%M:%S,%3f"),
                    level.as_str(),
                    target,
                    fields.message
                );
                if let Some(error) = fields.error {
                    let exception_type = fields.error_type.take();
                    point = point.tag(
                        "exception_type",
                        exception_type.unwrap_or_else(|| DEFAULT_EXCEPTION_TYPE.to_string()),
                    );
                    message.push('\n');
                    message.push_str(&error);
                }
                message
            }
        };

        if let Some(error_type) = fields.error_type {
            point = point.tag(ERROR_TYPE_FIELD, error_type);
        }
        for (key, value) in fields.extra {
            point = point.tag(key, value);
        }

        point.field(crate::query::MESSAGE_FIELD, message)
    }
}

impl<S> Layer<S> for InfluxLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if self.is_ignored(metadata.target()) {
            return;
        }

        let mut fields = EventFields::default();
        event.record(&mut fields);

        let point = self.build_point(metadata, fields, Utc::now());
        self.writer.write_point(&point);
    }
}

/// Numeric severity, on the scale most log consumers already filter by
pub fn level_number(level: &Level) -> u8 {
    match *level {
        Level::TRACE => 5,
        Level::DEBUG => 10,
        Level::INFO => 20,
        Level::WARN => 30,
        Level::ERROR => 40,
    }
}

fn basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

#[derive(Default)]
struct EventFields {
    message: String,
    error: Option<String>,
    error_type: Option<String>,
    extra: Vec<(String, String)>,
}

impl EventFields {
    fn set(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = value,
            "error" => self.error = Some(value),
            ERROR_TYPE_FIELD => self.error_type = Some(value),
            name => self.extra.push((name.to_string(), value)),
        }
    }
}

impl Visit for EventFields {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.set(field, format!("{:?}", value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.set(field, value.to_string());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.set(field, value.to_string());
    }
}
