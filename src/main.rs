use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use term_info::config::AppConfig;
use term_info::server;

#[derive(Parser)]
#[command(name = "term-info")]
#[command(about = "SSH service that shows terminal information to trusted keys")]
#[command(version)]
struct Cli {
    /// Path to the config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Debug log level
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // The log level in the config file can only apply once it is loaded, so
    // load first and report config errors after tracing is up.
    let config = AppConfig::load(cli.config.as_deref());

    let default_level = if cli.debug {
        "debug".to_string()
    } else {
        config
            .as_ref()
            .ok()
            .and_then(|c| c.log_level.clone())
            .unwrap_or_else(|| "info".to_string())
    };

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&default_level)
            .with_context(|| format!("invalid log level {:?}", default_level))?,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config?;
    info!("Configuration loaded");

    server::run(&config).await?;
    Ok(())
}
