//! Write path: tracing events to InfluxDB points
//!
//! [`InfluxLogging`] wires one [`InfluxClient`] into both directions: an
//! [`InfluxLayer`] for shipping events and a [`LogQueryService`] for
//! reading them back.

pub mod layer;
pub mod point;
pub mod writer;

pub use layer::{level_number, InfluxLayer, PointStyle};
pub use point::{FieldValue, Point};
pub use writer::AsyncWriter;

use crate::client::InfluxClient;
use crate::config::Config;
use crate::service::LogQueryService;
use std::sync::Arc;
use std::time::Duration;

pub struct InfluxLogging {
    writer: AsyncWriter,
    service: LogQueryService,
    measurement: String,
    style: PointStyle,
}

impl InfluxLogging {
    /// Spawns the background writer, so this must run inside a tokio runtime
    pub fn from_config(config: &Config) -> Self {
        let client = Arc::new(InfluxClient::from_config(&config.influxdb));
        let writer = AsyncWriter::spawn(
            client.clone(),
            config.writer.batch_size,
            Duration::from_millis(config.writer.flush_interval_ms),
        );
        let service = LogQueryService::new(
            client,
            &config.influxdb.bucket,
            &config.influxdb.measurement,
        );

        Self {
            writer,
            service,
            measurement: config.influxdb.measurement.clone(),
            style: PointStyle::from_config(&config.writer),
        }
    }

    /// A fresh layer feeding this instance's writer
    pub fn layer(&self) -> InfluxLayer {
        InfluxLayer::new(self.writer.clone(), &self.measurement, self.style.clone())
    }

    pub fn writer(&self) -> &AsyncWriter {
        &self.writer
    }

    pub fn service(&self) -> &LogQueryService {
        &self.service
    }

    pub async fn flush(&self) {
        self.writer.flush().await;
    }

    /// Flush pending points and stop the writer. Later events are dropped.
    pub async fn close(&self) {
        self.writer.close().await;
    }
}
