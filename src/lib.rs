//! Persist `tracing` events to InfluxDB and read them back.
//!
//! Records are fetched either by recency ([`LogQueryService::fetch_recent`])
//! or by time window ([`LogQueryService::fetch_by_time`]), optionally
//! narrowed by tag filters built from [`FilterExpression`]s.

pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod query;
pub mod record;
pub mod service;

pub use client::{InfluxClient, PointWriter, QueryEngine, RowStream};
pub use error::{Error, ErrorKind, Result};
pub use handler::{AsyncWriter, InfluxLayer, InfluxLogging, Point, PointStyle};
pub use query::{FilterExpression, FilterNode, Operator, TagConstraint, Timestamp};
pub use record::LogRecord;
pub use service::{Constraints, LogQueryService, LogStream};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize console tracing
///
/// `RUST_LOG` wins over `level` when set. `format` is "text" or "json".
/// Can only be called once per process.
pub fn init_tracing(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        "json" => registry
            .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
            .init(),
        _ => registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init(),
    }
}
