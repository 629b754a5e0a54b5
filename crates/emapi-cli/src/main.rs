use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tokio::io::BufReader;
use tracing::Level;

use emapi_cli::{ConfigManager, Session};

#[derive(Parser)]
#[command(
    name = "emapi",
    about = "Interactive client for the Email Manager web services",
    version,
    long_about = "Reads commands from standard input, one per line: login <id> <password>, exportresponse, send_multipleemails_withdeployment [csv-file], exit."
)]
struct Cli {
    /// Set the logging level
    #[arg(short, long, value_enum, default_value = "warn")]
    log_level: LogLevel,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Account base URL, overrides the configuration file
    #[arg(short, long, env = "EMAPI_ENDPOINT")]
    endpoint: Option<String>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so command output stays on stdout
    tracing_subscriber::fmt()
        .with_max_level(Level::from(cli.log_level))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let manager = match cli.config {
        Some(path) => ConfigManager::from_path(path),
        None => ConfigManager::new(),
    }
    .context("Failed to load configuration")?;
    tracing::debug!("Using configuration {}", manager.path().display());

    let mut config = manager.into_config();
    if let Some(endpoint) = cli.endpoint {
        config.endpoint = endpoint;
    }

    let mut session = Session::new(config, std::io::stdout());
    session.run(BufReader::new(tokio::io::stdin())).await
}
