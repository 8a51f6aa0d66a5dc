//! Ergon - LLM-backed recruitment API
//!
//! CLI entry point for the Ergon server.

#![forbid(unsafe_code)]

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod cli;
mod middleware;
mod server;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ergon=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = cli::Cli::parse();

    let has_subcommand = cli.command.is_some();

    if has_subcommand {
        info!("Starting Ergon v{}", env!("CARGO_PKG_VERSION"));

        if std::env::var("OPENROUTER_API_KEY").is_err() {
            warn!("OPENROUTER_API_KEY not set. The server will refuse to start without it.");
        }
    }

    cli::run(cli).await
}
