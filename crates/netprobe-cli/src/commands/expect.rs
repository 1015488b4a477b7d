//! Expect command

use std::path::PathBuf;

use clap::Args;
use netprobe_connectivity::DEFAULT_TIMEOUT_SECONDS;

use super::load_scenario;
use crate::printer::Printer;
use crate::Result;

#[derive(Args, Debug)]
pub struct ExpectArgs {
    /// Scenario file (falls back to NETPROBE_SCENARIO, then ./netprobe.yaml)
    #[arg(long)]
    pub scenario: Option<PathBuf>,
}

pub async fn run(args: ExpectArgs) -> Result<()> {
    let (scenario, resources) = load_scenario(args.scenario.as_deref())?;
    let expected = scenario.expected_table(&resources, DEFAULT_TIMEOUT_SECONDS)?;
    print!("{}", Printer::default().expectation(&expected));
    Ok(())
}
