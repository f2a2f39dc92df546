//! Flux query assembly
//!
//! Builds the two query shapes the service issues:
//!
//! ```text
//! from(bucket: "logs")
//! |> range(start: 0)
//! |> filter(fn: (r) => r["_measurement"] == "logging")
//! |> filter(fn: (r) => r["_field"] == "message")
//! |> filter(fn: (r) => r["level"] == "INFO")
//! |> group()
//! |> sort(columns: ["_time"], desc: true)
//! |> limit(n: 3)
//! |> sort(columns: ["_time"])
//! ```
//!
//! `group()` merges the per-tag-set tables so that sorting and the limit
//! apply across all series. The recency shape selects the newest `n`
//! points and then restores ascending order.

use super::filter::FilterExpression;
use super::time::flux_time;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};

/// Field every log point carries its message in
pub const MESSAGE_FIELD: &str = "message";

/// Time window of a query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Window {
    /// The newest `limit` points, any time
    Recent { limit: usize },
    /// `[start, stop)`; `stop == None` means the server's `now()`
    Range {
        start: DateTime<Utc>,
        stop: Option<DateTime<Utc>>,
    },
}

/// A log query ready to be rendered into Flux text
#[derive(Debug, Clone)]
pub struct FluxQuery {
    bucket: String,
    measurement: String,
    window: Window,
    filter: Option<FilterExpression>,
}

impl FluxQuery {
    pub fn recent(bucket: impl Into<String>, measurement: impl Into<String>, limit: usize) -> Self {
        Self {
            bucket: bucket.into(),
            measurement: measurement.into(),
            window: Window::Recent { limit },
            filter: None,
        }
    }

    pub fn range(
        bucket: impl Into<String>,
        measurement: impl Into<String>,
        start: DateTime<Utc>,
        stop: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            measurement: measurement.into(),
            window: Window::Range { start, stop },
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: Option<FilterExpression>) -> Self {
        self.filter = filter;
        self
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Render the full query text
    pub fn render(&self) -> Result<String> {
        let range = match &self.window {
            Window::Recent { limit: 0 } => {
                return Err(Error::Validation(
                    "limit must be a positive integer".to_string(),
                ))
            }
            Window::Recent { .. } => "range(start: 0)".to_string(),
            Window::Range { start, stop } => format!(
                "range(start: {}, stop: {})",
                flux_time(start),
                stop.as_ref().map(flux_time).unwrap_or_else(|| "now()".to_string())
            ),
        };

        let mut stages = vec![
            format!("from(bucket: \"{}\")", self.bucket),
            range,
            format!(
                "filter(fn: (r) => r[\"_measurement\"] == \"{}\")",
                self.measurement
            ),
            format!("filter(fn: (r) => r[\"_field\"] == \"{}\")", MESSAGE_FIELD),
        ];

        if let Some(filter) = &self.filter {
            stages.push(filter.render()?);
        }

        stages.push("group()".to_string());

        match &self.window {
            Window::Recent { limit } => {
                stages.push("sort(columns: [\"_time\"], desc: true)".to_string());
                stages.push(format!("limit(n: {})", limit));
                stages.push("sort(columns: [\"_time\"])".to_string());
            }
            Window::Range { .. } => {
                stages.push("sort(columns: [\"_time\"])".to_string());
            }
        }

        Ok(stages.join("\n|> "))
    }
}
