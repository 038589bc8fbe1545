#![recursion_limit = "256"]

mod cli;
mod application;
mod domain;
mod data;
mod ml;
mod infra;

use anyhow::Result;
use cli::Cli;
use clap::Parser;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Held until exit so the log file is flushed on every return path
    let _log = infra::run_log::init(cli.log_dir.as_deref())?;
    cli.run()
}
