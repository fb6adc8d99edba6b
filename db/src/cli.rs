//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Daybook - dictated journal
#[derive(Parser)]
#[command(
    name = "daybook",
    about = "Dictated journal with propose, review and confirm write sessions",
    version,
    after_help = "Logs are written to: ~/.local/share/daybook/logs/daybook.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Start an interactive write session
    Repl,

    /// Print one day of the journal
    Show {
        /// Day to show (YYYY-MM-DD)
        #[arg(value_name = "DATE")]
        date: String,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// List days that have journal content
    Days {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the most recent day
    Latest,
}

/// Output format for read-only commands
#[derive(Clone, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Path of the log file written by the binary
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("daybook")
        .join("logs")
        .join("daybook.log")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_no_command() {
        let cli = Cli::parse_from(["daybook"]);
        assert!(cli.command.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn test_cli_parse_repl() {
        let cli = Cli::parse_from(["daybook", "-v", "repl"]);
        assert!(matches!(cli.command, Some(Command::Repl)));
        assert!(cli.verbose);
    }

    #[test]
    fn test_cli_parse_show() {
        let cli = Cli::parse_from(["daybook", "show", "2026-02-20", "--format", "json"]);
        match cli.command {
            Some(Command::Show { date, format }) => {
                assert_eq!(date, "2026-02-20");
                assert!(matches!(format, OutputFormat::Json));
            }
            _ => panic!("expected show"),
        }
    }

    #[test]
    fn test_cli_parse_days_and_latest() {
        assert!(matches!(
            Cli::parse_from(["daybook", "days"]).command,
            Some(Command::Days {
                format: OutputFormat::Text
            })
        ));
        assert!(matches!(Cli::parse_from(["daybook", "latest"]).command, Some(Command::Latest)));
    }

    #[test]
    fn test_output_format_from_str() {
        assert!(matches!("text".parse::<OutputFormat>(), Ok(OutputFormat::Text)));
        assert!(matches!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json)));
        assert!("table".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_cli_with_config() {
        let cli = Cli::parse_from(["daybook", "-c", "/path/to/config.yml", "days"]);
        assert_eq!(cli.config, Some(PathBuf::from("/path/to/config.yml")));
    }

    #[test]
    fn test_log_path() {
        assert!(get_log_path().ends_with("daybook/logs/daybook.log"));
    }
}
