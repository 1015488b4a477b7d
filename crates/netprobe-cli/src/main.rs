//! netprobe CLI
//!
//! Probes network policy connectivity against an expected truth table.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use netprobe_cli::{Cli, Result};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbosity
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.verbosity)))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    cli.run().await
}
