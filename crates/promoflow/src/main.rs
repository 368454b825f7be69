//! Promoflow launcher
//!
//! Thin binary over the library: tracing init, argument parsing, dispatch.

use clap::Parser;
use promoflow::cli::Cli;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    Cli::parse().run().await
}
