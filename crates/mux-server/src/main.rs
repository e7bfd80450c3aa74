//! Broker binary for the multiplexed game-server console.

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use mux_server::broker::Broker;
use mux_server::config::{Config, Transport};

#[derive(Parser, Debug)]
#[command(name = "mux-server", about = "Shared control broker for a game server")]
struct Args {
    /// Path to a TOML config file; defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = match args.config {
        Some(path) => Config::load(&path)?,
        None => Config::default(),
    };

    match config.server.transport {
        Transport::Tcp => info!(addr = %config.socket_addr_string(), "listening (tcp)"),
        Transport::Unix => info!(path = %config.server.listen_addr, "listening (unix)"),
    }

    let broker = Broker::bind(config).await?;
    broker.run().await
}
