//! netprobe CLI library

pub mod commands;
pub mod config;
pub mod error;
pub mod kubectl;
pub mod printer;

pub use error::{Error, Result};

use clap::{Parser, Subcommand};

/// netprobe - Network policy connectivity testing
#[derive(Parser, Debug)]
#[command(name = "netprobe")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Log filter used when RUST_LOG is unset (e.g. debug, info, warn)
    #[arg(short, long, global = true, default_value = "info")]
    pub verbosity: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the expected connectivity tables of a scenario
    Expect(commands::expect::ExpectArgs),
    /// Probe a cluster and compare against the expected tables
    Probe(commands::probe::ProbeArgs),
    /// Describe the traffic between two peers
    Traffic(commands::traffic::TrafficArgs),
}

impl Cli {
    /// Run the CLI command
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Expect(args) => commands::expect::run(args).await,
            Commands::Probe(args) => commands::probe::run(args).await,
            Commands::Traffic(args) => commands::traffic::run(args).await,
        }
    }
}
