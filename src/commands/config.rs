use anyhow::Result;
use colored::Colorize;
use influx_logging::config::{self, mask_secret, Config, PointStyleKind};
use std::path::Path;
use tracing::info;

/// Execute the config show command
///
/// Displays the current configuration with the token masked
pub fn show(path: &Path) -> Result<()> {
    println!("{}", "Loading configuration...".yellow());
    info!(path = %path.display(), "Loading configuration for display");

    let cfg = config::load_config(path)?;
    let sanitized = sanitize_secrets(&cfg);

    println!("{}", "Current Configuration:".green().bold());
    println!();

    let toml_string = toml::to_string_pretty(&sanitized)?;
    println!("{}", toml_string);

    Ok(())
}

/// Execute the config validate command
pub fn validate(path: &Path) -> Result<()> {
    println!("{}", "Validating configuration...".yellow());
    info!(path = %path.display(), "Validating configuration file");

    let cfg = config::load_config(path)?;

    println!("{}", "✓ Configuration is valid".green());
    println!();
    for line in summary(&cfg) {
        println!("{}", line);
    }

    info!("Configuration validation successful");
    Ok(())
}

fn sanitize_secrets(cfg: &Config) -> Config {
    let mut sanitized = cfg.clone();
    sanitized.influxdb.token = mask_secret(&sanitized.influxdb.token);
    sanitized
}

fn summary(cfg: &Config) -> Vec<String> {
    let style = match cfg.writer.style {
        PointStyleKind::Structured => "structured".to_string(),
        PointStyleKind::Prefixed => format!(
            "prefixed (bot={}, shard={})",
            cfg.writer.bot.as_deref().unwrap_or("-"),
            cfg.writer.shard_id.as_deref().unwrap_or("-")
        ),
    };

    vec![
        "Summary:".bold().to_string(),
        format!("  InfluxDB: {}", cfg.influxdb.url),
        format!("  Org / Bucket: {} / {}", cfg.influxdb.org, cfg.influxdb.bucket),
        format!("  Measurement: {}", cfg.influxdb.measurement),
        format!(
            "  Writer: batch {} / every {} ms, {}",
            cfg.writer.batch_size, cfg.writer.flush_interval_ms, style
        ),
    ]
}
