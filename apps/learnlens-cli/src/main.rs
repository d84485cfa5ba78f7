mod commands;
mod config;
mod logging;
mod services;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use learnlens_auth::{ApiClient, FileTokenStore, Session};

use crate::commands::Commands;
use crate::config::{AppConfig, CliOverrides};

/// LearnLens - learning-analytics dashboard from the command line
#[derive(Parser)]
#[command(name = "learnlens")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (default: ./learnlens.yaml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// API base URL (overrides config)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Print effective configuration (JSON) and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Layered config:
    // 1) defaults -> 2) YAML -> 3) env (LEARNLENS__*) -> 4) CLI overrides
    let mut config = AppConfig::load(cli.config.as_deref())?;
    config.apply_cli_overrides(&CliOverrides {
        base_url: cli.base_url.clone(),
        verbose: cli.verbose,
    });

    logging::init_logging(&config.logging);

    if cli.print_config {
        println!("{}", config.to_json()?);
        return Ok(());
    }

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let token_file = config.token_file()?;
    let store = FileTokenStore::open(&token_file)
        .with_context(|| format!("failed to open token store {}", token_file.display()))?;
    tracing::debug!(path = %token_file.display(), "token store opened");

    let api = ApiClient::new(&config.api_client_config()?, Arc::new(store))
        .context("failed to initialize API client")?;
    let session = Session::new(api);

    commands::run(command, &session).await
}
