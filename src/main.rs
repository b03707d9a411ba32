//! Syncwatch Server
//!
//! Run with: cargo run --bin syncwatch
//!
//! # Configuration
//!
//! Loaded from `--config <path>` or the default locations, then overridden
//! by environment variables:
//! - `PORT`: Port to listen on (default: 3000)
//! - `CONTENT_DIR`: Media directory served under /content/ (default: ./content)
//! - `TEMPLATE_DIR`: Directory holding index.html (default: ./templates)
//! - `LOG_DIR`: Directory for syncwatch.log (default: ./logs)
//! - `SYNCWATCH_HOST`: Host to bind to (default: 0.0.0.0)
//! - `SYNCWATCH_CHANNEL_CAPACITY`: Messages buffered per viewer (default: 64)
//! - `SYNCWATCH_LOG_LEVEL`, `SYNCWATCH_LOG_FORMAT`: Logging (default: info, pretty)
//! - `RUST_LOG`: Full filter, overrides the level

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use syncwatch::api::{serve, AppState};
use syncwatch::config::{generate_default_config, Config, ConfigOrigin};

#[derive(Debug, Parser)]
#[command(name = "syncwatch", version, about = "Watch-together playback sync server")]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config and PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Print a default config file and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.print_config {
        print!("{}", generate_default_config());
        return Ok(());
    }

    let (mut config, origin) = match &cli.config {
        Some(path) => (
            Config::load_with_env(path)?,
            ConfigOrigin {
                path: Some(path.clone()),
                skipped: Vec::new(),
            },
        ),
        None => Config::load_default(),
    };
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    match syncwatch::logging::init(&config.logging)? {
        Some(path) => tracing::info!("Logging to {:?}", path),
        None => tracing::info!("Logging to stdout"),
    }

    for e in &origin.skipped {
        tracing::warn!("Skipped config file: {}", e);
    }
    match &origin.path {
        Some(path) => tracing::info!("Loaded config from {:?}", path),
        None => tracing::info!("Using default config with environment overrides"),
    }

    tracing::info!("Starting Syncwatch v{}", env!("CARGO_PKG_VERSION"));

    let server = config.server.clone();
    serve(AppState::new(config), &server)
        .await
        .with_context(|| format!("server on {} failed", server.addr()))?;

    Ok(())
}
