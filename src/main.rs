use anyhow::Result;
use clap::Parser;
use std::path::Path;

mod cli;
mod commands;

use cli::{Commands, ConfigCommands};
use influx_logging::config::{load_config, Config};
use influx_logging::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    match args.command {
        Commands::Recent { limit, filter, output } => {
            let cfg = load(&args.config)?;
            commands::logs::recent(&cfg, limit, &filter, output.format).await?;
        }
        Commands::Range {
            start,
            end,
            filter,
            output,
        } => {
            let cfg = load(&args.config)?;
            commands::logs::range(&cfg, &start, end.as_deref(), &filter, output.format).await?;
        }
        Commands::Query { flux, output } => {
            let cfg = load(&args.config)?;
            commands::logs::query(&cfg, &flux, output.format).await?;
        }
        Commands::Config { action } => {
            init_tracing("info", "text");
            match action {
                ConfigCommands::Show => commands::config::show(&args.config)?,
                ConfigCommands::Validate => commands::config::validate(&args.config)?,
            }
        }
        Commands::Version => {
            println!("influx-logs v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

/// Load configuration, then start console tracing as it asks
fn load(path: &Path) -> Result<Config> {
    let cfg = load_config(path)?;
    init_tracing(&cfg.logging.level, &cfg.logging.format);
    Ok(cfg)
}
