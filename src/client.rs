//! InfluxDB 2.x HTTP transport
//!
//! [`QueryEngine`] and [`PointWriter`] are the two things the rest of the
//! crate needs from the storage engine. [`InfluxClient`] implements both
//! over `/api/v2/query` and `/api/v2/write`.

use crate::config::{mask_secret, InfluxDbConfig};
use crate::error::{Error, Result};
use crate::query::{decode_rows, FluxRow};
use async_trait::async_trait;
use futures::stream::BoxStream;
use reqwest::{header, Client, Response};
use serde_json::json;
use std::fmt;
use std::time::Duration;

/// Rows of a query response, decoded as they arrive
pub type RowStream = BoxStream<'static, Result<FluxRow>>;

/// Executes Flux text and streams back the result rows
#[async_trait]
pub trait QueryEngine: Send + Sync {
    /// Send `flux` verbatim. Errors reported before the body starts are
    /// returned here; later ones end the stream.
    async fn query(&self, flux: &str) -> Result<RowStream>;
}

/// Accepts line-protocol points
#[async_trait]
pub trait PointWriter: Send + Sync {
    async fn write_lines(&self, lines: &[String]) -> Result<()>;
}

/// Connection settings for one org / bucket
#[derive(Clone)]
pub struct InfluxClient {
    http: Client,
    base_url: String,
    org: String,
    bucket: String,
    token: String,
    timeout: Duration,
}

impl InfluxClient {
    pub fn new(
        base_url: impl Into<String>,
        org: impl Into<String>,
        bucket: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            org: org.into(),
            bucket: bucket.into(),
            token: token.into(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn from_config(config: &InfluxDbConfig) -> Self {
        Self::new(&config.url, &config.org, &config.bucket, &config.token)
            .with_timeout(Duration::from_secs(config.timeout_seconds))
    }

    /// Per-request timeout, covering the whole response body
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Reuse an existing HTTP client (connection pool)
    pub fn with_http_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    pub fn org(&self) -> &str {
        &self.org
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn auth_header(&self) -> String {
        format!("Token {}", self.token)
    }
}

impl fmt::Debug for InfluxClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InfluxClient")
            .field("base_url", &self.base_url)
            .field("org", &self.org)
            .field("bucket", &self.bucket)
            .field("token", &mask_secret(&self.token))
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[async_trait]
impl QueryEngine for InfluxClient {
    async fn query(&self, flux: &str) -> Result<RowStream> {
        let url = format!("{}/api/v2/query", self.base_url);
        let body = json!({
            "query": flux,
            "type": "flux",
            "dialect": {
                "header": true,
                "annotations": [],
                "delimiter": ",",
                "dateTimeFormat": "RFC3339Nano",
            },
        });

        tracing::debug!(org = %self.org, query = %flux, "Sending Flux query");

        let response = self
            .http
            .post(&url)
            .query(&[("org", self.org.as_str())])
            .header(header::AUTHORIZATION, self.auth_header())
            .header(header::ACCEPT, "application/csv")
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await?;

        let response = check_status(response).await?;
        Ok(decode_rows(Box::pin(response.bytes_stream())))
    }
}

#[async_trait]
impl PointWriter for InfluxClient {
    async fn write_lines(&self, lines: &[String]) -> Result<()> {
        if lines.is_empty() {
            return Ok(());
        }

        let url = format!("{}/api/v2/write", self.base_url);
        let response = self
            .http
            .post(&url)
            .query(&[
                ("org", self.org.as_str()),
                ("bucket", self.bucket.as_str()),
                ("precision", "us"),
            ])
            .header(header::AUTHORIZATION, self.auth_header())
            .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .timeout(self.timeout)
            .body(lines.join("\n"))
            .send()
            .await?;

        check_status(response).await?;
        Ok(())
    }
}

/// Turn a non-2xx response into [`Error::Upstream`]
async fn check_status(response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    // InfluxDB error bodies look like {"code": "invalid", "message": "..."}
    let message = serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or(text);

    Err(Error::Upstream { status, message })
}
