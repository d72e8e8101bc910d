//! Command-line front-end for agent-bus.
//!
//! Grounded on `atm::main`: parse, dispatch, print any error to stderr and
//! exit 1.

mod commands;

use clap::Parser;

fn main() {
    agent_bus_core::logging::init();
    let cli = commands::Cli::parse();
    if let Err(e) = cli.execute() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
