use std::fs::File;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use tui::RealtimeSubscriber;

mod app;

#[derive(Parser, Debug)]
#[command(about = "Terminal live feed of gym dashboard events")]
struct Args {
    /// Server base URL
    #[arg(short, long, default_value = "http://127.0.0.1:1337")]
    url: String,

    /// Write logs here; the terminal itself is owned by the UI
    #[arg(long, default_value = "tui.log")]
    log_file: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log = File::create(&args.log_file)
        .with_context(|| format!("Failed to create log file {}", args.log_file))?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_ansi(false)
        .with_writer(Mutex::new(log))
        .init();

    let subscriber = RealtimeSubscriber::connect(&args.url)
        .with_context(|| format!("Failed to subscribe to {}", args.url))?;

    let mut terminal = ratatui::init();
    let result = app::App::new(subscriber).run(&mut terminal).await;
    ratatui::restore();
    result
}
