use anyhow::{Context, Result};
use clap::Parser;
use shared::config::{LiveConfig, load_config_or_default};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use server::{AppState, database, serve};

#[derive(Parser, Debug)]
#[command(about = "Gym dashboard server with realtime SSE updates")]
struct Args {
    /// Path to the TOML config file; defaults are used if it does not exist
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Override `server.port`
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = load_config_or_default(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config))?;
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let db = database::connect(&config.database)
        .await
        .context("Failed to open database")?;

    let addr = config.server.addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let state = AppState::new(LiveConfig::new(config), db.clone());

    tokio::select! {
        result = serve(listener, state) => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutdown signal received"),
    }

    db.close().await;
    info!("Server closed");
    Ok(())
}
