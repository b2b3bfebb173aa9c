// anchorscan command line interface
// Replays scripted scanning sessions and inspects configuration

mod replay;
mod script;

use anchorscan_core::RecognizerRect;
use anchorscan_eye::processing::GeometryReconciler;
use anchorscan_eye::ScanConfig;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use crate::script::SessionScript;

#[derive(Parser)]
#[command(name = "anchorscan")]
#[command(about = "Symbol scanning and marker anchoring for tracked camera sessions", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    /// Log line format on stderr
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a session script through the scan pipeline
    Replay {
        /// Session script (JSON or TOML)
        script: PathBuf,

        /// Configuration file path
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Override the number of frames skipped between submissions
        #[arg(long)]
        skip_cycles: Option<u32>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration
    Config {
        /// Configuration file path
        #[arg(long, short)]
        config: Option<PathBuf>,
    },

    /// Convert a recognizer rectangle (bottom-left origin) to query space
    Flip {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level, cli.log_format);

    match cli.command {
        Commands::Replay {
            script,
            config,
            skip_cycles,
            json,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(skip_cycles) = skip_cycles {
                config.skip_cycles = skip_cycles;
            }
            let script = SessionScript::from_file(&script)?;
            let report = replay::run(&script, config).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                replay::print_table(&report);
            }
        }
        Commands::Config { config } => {
            let config = load_config(config.as_deref())?;
            println!("{}", toml::to_string_pretty(&config)?);
        }
        Commands::Flip {
            x,
            y,
            width,
            height,
        } => {
            let region = RecognizerRect::try_new(x, y, width, height)?;
            let flipped = region.flip();
            let point = GeometryReconciler::query_point(&region);
            println!("{} -> {}", region, flipped);
            println!("query point: ({:.4}, {:.4})", point.x, point.y);
        }
    }

    Ok(())
}

fn init_logging(level: &str, format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Defaults, then the config file, then `ANCHORSCAN_*` variables.
fn load_config(path: Option<&Path>) -> Result<ScanConfig> {
    let mut config = match path {
        Some(path) => ScanConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ScanConfig::default(),
    };
    config.apply_env();
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {}", e))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_defaults_to_text() {
        let cli = Cli::try_parse_from(["anchorscan", "config"]).unwrap();
        assert_eq!(cli.log_format, LogFormat::Text);
        assert_eq!(cli.log_level, "warn");
    }

    #[test]
    fn test_json_log_format_flag() {
        let cli = Cli::try_parse_from([
            "anchorscan",
            "--log-format",
            "json",
            "flip",
            "0.4",
            "0.1",
            "0.2",
            "0.1",
        ])
        .unwrap();
        assert_eq!(cli.log_format, LogFormat::Json);
        assert!(matches!(cli.command, Commands::Flip { .. }));
    }

    #[test]
    fn test_unknown_log_format_rejected() {
        assert!(Cli::try_parse_from(["anchorscan", "--log-format", "xml", "config"]).is_err());
    }
}
