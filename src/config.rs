use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub influxdb: InfluxDbConfig,
    #[serde(default)]
    pub writer: WriterConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InfluxDbConfig {
    pub url: String,
    pub org: String,
    pub bucket: String,
    pub token: String,
    #[serde(default = "default_measurement")]
    pub measurement: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

/// How log events are shaped into points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PointStyleKind {
    /// One tag per event attribute (logger, level, file, line, ...)
    #[default]
    Structured,
    /// Pre-formatted message tagged with bot / shard id
    Prefixed,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WriterConfig {
    /// Max lines per write request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Max time a line waits before being written
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
    #[serde(default)]
    pub style: PointStyleKind,
    #[serde(default)]
    pub bot: Option<String>,
    #[serde(default)]
    pub shard_id: Option<String>,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            flush_interval_ms: default_flush_interval_ms(),
            style: PointStyleKind::default(),
            bot: None,
            shard_id: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// "text" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_measurement() -> String {
    "logging".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_batch_size() -> usize {
    100
}

fn default_flush_interval_ms() -> u64 {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

/// Load configuration from `path` (optional) layered under
/// `INFLUX_LOGGING__*` environment variables.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let config = config::Config::builder()
        .add_source(config::File::from(path).required(false))
        .add_source(config::Environment::with_prefix("INFLUX_LOGGING").separator("__"))
        .build()?;

    let cfg: Config = config.try_deserialize()?;
    validate_config(&cfg)?;

    Ok(cfg)
}

pub fn validate_config(cfg: &Config) -> anyhow::Result<()> {
    let db = &cfg.influxdb;

    let url = url::Url::parse(&db.url)
        .map_err(|e| anyhow::anyhow!("Invalid InfluxDB url '{}': {}", db.url, e))?;
    if !matches!(url.scheme(), "http" | "https") {
        anyhow::bail!("InfluxDB url must use http or https, got '{}'", url.scheme());
    }

    for (name, value) in [
        ("org", &db.org),
        ("bucket", &db.bucket),
        ("token", &db.token),
        ("measurement", &db.measurement),
    ] {
        if value.trim().is_empty() {
            anyhow::bail!("influxdb.{} cannot be empty", name);
        }
    }

    if db.timeout_seconds == 0 {
        anyhow::bail!("influxdb.timeout_seconds must be greater than 0");
    }

    if cfg.writer.batch_size == 0 {
        anyhow::bail!("writer.batch_size must be greater than 0");
    }

    if cfg.writer.flush_interval_ms == 0 {
        anyhow::bail!("writer.flush_interval_ms must be greater than 0");
    }

    if cfg.writer.style == PointStyleKind::Prefixed && cfg.writer.bot.is_none() {
        anyhow::bail!("writer.style = \"prefixed\" requires writer.bot");
    }

    match cfg.logging.format.as_str() {
        "text" | "json" => {}
        other => anyhow::bail!("Invalid logging.format '{}': expected text or json", other),
    }

    Ok(())
}

/// Mask a secret for display: first 4 and last 4 characters
///
/// Example: "my-super-secret-token" -> "my-s...oken"
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 12 {
        // Too short to mask meaningfully
        return "***".to_string();
    }

    let prefix: String = chars[..4].iter().collect();
    let suffix: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", prefix, suffix)
}
