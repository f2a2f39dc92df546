//! Log query commands
//!
//! Fetch records from InfluxDB and print them as coloured text or JSON.

use crate::cli::{FilterArgs, OutputFormat};
use anyhow::Result;
use colored::Colorize;
use futures::TryStreamExt;
use influx_logging::config::Config;
use influx_logging::{
    Constraints, FilterExpression, InfluxClient, LogQueryService, LogRecord, LogStream, Timestamp,
};
use std::sync::Arc;

/// `recent`: the newest `limit` records, oldest first
pub async fn recent(cfg: &Config, limit: usize, filter: &FilterArgs, format: OutputFormat) -> Result<()> {
    let constraints = build_constraints(filter)?;
    let records = service(cfg).fetch_recent(limit, constraints).await?;
    print_records(records, format).await
}

/// `range`: records with `start <= time < end`
pub async fn range(
    cfg: &Config,
    start: &str,
    end: Option<&str>,
    filter: &FilterArgs,
    format: OutputFormat,
) -> Result<()> {
    let start: Timestamp = start.parse()?;
    let end = end.map(str::parse::<Timestamp>).transpose()?;
    let constraints = build_constraints(filter)?;

    let records = service(cfg).fetch_by_time(start, end, constraints).await?;
    print_records(records, format).await
}

/// `query`: raw Flux text
pub async fn query(cfg: &Config, flux: &str, format: OutputFormat) -> Result<()> {
    let records = service(cfg).query(flux).await?;
    print_records(records, format).await
}

fn service(cfg: &Config) -> LogQueryService {
    let client = InfluxClient::from_config(&cfg.influxdb);
    LogQueryService::new(
        Arc::new(client),
        &cfg.influxdb.bucket,
        &cfg.influxdb.measurement,
    )
}

/// Combine `--tag` pairs and a `--filter` document
fn build_constraints(args: &FilterArgs) -> Result<Constraints> {
    let mut constraints = Constraints::new();
    for (key, value) in &args.tags {
        constraints = constraints.tag(key, value);
    }
    if let Some(json) = &args.filter {
        constraints = constraints.filter(FilterExpression::from_json(json)?);
    }
    Ok(constraints)
}

async fn print_records(mut records: LogStream, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let records: Vec<LogRecord> = records.try_collect().await?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        OutputFormat::Text => {
            let mut count = 0usize;
            while let Some(record) = records.try_next().await? {
                println!("{}", format_record(&record));
                count += 1;
            }

            if count == 0 {
                println!("{}", "No logs found matching the criteria".yellow());
            } else {
                println!();
                println!("{}", format!("Found {} log entries", count).bold());
            }
        }
    }

    Ok(())
}

/// One line per record: time, level, message, then the remaining tags
fn format_record(record: &LogRecord) -> String {
    let timestamp = record.time.format("%Y-%m-%d %H:%M:%S%.3f").to_string();

    let level = match record.level.as_str() {
        "ERROR" | "CRITICAL" => record.level.red().bold(),
        "WARN" | "WARNING" => record.level.yellow().bold(),
        "INFO" => record.level.green(),
        "DEBUG" => record.level.blue(),
        _ => record.level.normal(),
    };

    let mut line = format!("{} {} {}", timestamp.dimmed(), level, record.message);

    if !record.extra.is_empty() {
        let tags: Vec<String> = record
            .extra
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        line.push_str(&format!("  {}", tags.join(" ").dimmed()));
    }

    line
}
