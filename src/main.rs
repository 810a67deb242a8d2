//! StoryGram Server
//!
//! Binary entry point for running the StoryGram services.

use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use storygram::common::config::StoryGramConfig;
use storygram::StoryGramServer;

#[derive(Parser, Debug)]
#[command(name = "storygram")]
#[command(about = "Ephemeral story sharing backend", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "storygram.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Credential signing secret
    #[arg(long, env = "STORYGRAM_JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,

    /// Override the bind host
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)))
        .init();

    info!("StoryGram v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config: StoryGramConfig = if args.config.exists() {
        let content = std::fs::read_to_string(&args.config)?;
        toml::from_str(&content)?
    } else {
        info!("Using default configuration");
        StoryGramConfig::default()
    };

    if let Some(secret) = args.jwt_secret {
        config.auth.jwt_secret = Some(secret);
    }
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let server = StoryGramServer::new(config)?;
    let mut running = server.start().await?;

    tokio::select! {
        result = running.stopped() => {
            if let Err(e) = result {
                error!("Server error: {}", e);
            }
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Received shutdown signal");
        }
    }

    running.shutdown().await?;
    Ok(())
}
