//! Daybook - dictated journal
//!
//! CLI entry point for the interactive write session and read-only journal views.

use std::fs;

use clap::{CommandFactory, Parser};
use eyre::{Context, Result};
use tracing::info;

use daybook::cli::{Cli, Command, OutputFormat, get_log_path};
use daybook::config::Config;
use daybook::coordinator::parse_day;
use daybook::repl;

fn setup_logging(verbose: bool) -> Result<()> {
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Log to file so the REPL output stays clean
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (verbose: {})", verbose);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    info!(
        "Daybook loaded config: db={}, model-enabled={}, model={}, editor-enabled={}",
        config.storage.db_path, config.model.enabled, config.model.model, config.model.editor.enabled
    );

    match cli.command {
        Some(Command::Repl) => repl::run_interactive(&config).await,
        Some(Command::Show { date, format }) => cmd_show(&config, &date, format).await,
        Some(Command::Days { format }) => cmd_days(&config, format).await,
        Some(Command::Latest) => cmd_latest(&config).await,
        None => {
            let mut cmd = Cli::command();
            cmd.print_help()?;
            println!();
            Ok(())
        }
    }
}

async fn cmd_show(config: &Config, date: &str, format: OutputFormat) -> Result<()> {
    let day = parse_day(date)?;
    let store = repl::open_store(config)?;
    let snapshot = store.read_day(day).await.context("Failed to read day")?;

    match format {
        OutputFormat::Text => println!("{}", snapshot.content.trim_end()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&snapshot)?),
    }
    Ok(())
}

async fn cmd_days(config: &Config, format: OutputFormat) -> Result<()> {
    let store = repl::open_store(config)?;
    let days = store.list_days().await.context("Failed to list days")?;

    match format {
        OutputFormat::Text => {
            if days.is_empty() {
                println!("No days yet.");
            }
            for day in days {
                println!("{}", day);
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&days)?),
    }
    Ok(())
}

async fn cmd_latest(config: &Config) -> Result<()> {
    let store = repl::open_store(config)?;
    match store.latest_day().await.context("Failed to find latest day")? {
        Some(day) => {
            let snapshot = store.read_day(day).await.context("Failed to read day")?;
            println!("{}", snapshot.content.trim_end());
        }
        None => println!("No days yet."),
    }
    Ok(())
}
