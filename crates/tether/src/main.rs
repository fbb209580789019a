//! tether - host-driven automation agent

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::run_command;

/// Automation agent driven by a host over JSON lines on stdin/stdout
#[derive(Parser, Debug)]
#[command(name = "tether")]
#[command(about = "A host-driven automation agent speaking JSON lines over stdio")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Config file to load instead of ~/.tether/config.json
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Step budget for the session
    #[arg(long)]
    max_steps: Option<u32>,

    /// Model name to request from the provider
    #[arg(short, long)]
    model: Option<String>,

    /// Debug logging on stderr
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // stdout carries the protocol, so logs go to stderr
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run_command(cli).await {
        error!("Agent failed: {:#}", e);
        std::process::exit(1);
    }
}
