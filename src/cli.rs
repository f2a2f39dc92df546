use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "influx-logs", version, about = "Query log records stored in InfluxDB")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "influx-logging.toml", global = true)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Show the most recent records, oldest first
    Recent {
        /// Number of records to fetch
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,

        #[command(flatten)]
        filter: FilterArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Show records in a time window (start inclusive, end exclusive)
    Range {
        /// Window start, RFC 3339 with offset (e.g. 2026-01-01T00:00:00Z)
        #[arg(short, long)]
        start: String,

        /// Window end (default: now)
        #[arg(short, long)]
        end: Option<String>,

        #[command(flatten)]
        filter: FilterArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Run a raw Flux query
    Query {
        /// Flux source text
        flux: String,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Configuration management commands
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Show version information
    Version,
}

#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Require a tag value, repeatable (e.g. --tag level=ERROR)
    #[arg(short, long = "tag", value_name = "KEY=VALUE", value_parser = parse_tag)]
    pub tags: Vec<(String, String)>,

    /// JSON filter document, e.g. {"operator":"or","children":[{"level":"ERROR"},{"level":"WARN"}]}
    #[arg(long)]
    pub filter: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct OutputArgs {
    /// Output format
    #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommands {
    /// Display current configuration (with the token masked)
    Show,

    /// Validate configuration file
    Validate,
}

fn parse_tag(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))?;
    if key.is_empty() {
        return Err(format!("empty tag key in '{}'", s));
    }
    Ok((key.to_string(), value.to_string()))
}
