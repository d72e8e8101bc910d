//! `init` and `cleanup`: thin wrappers over `bus-core::lifecycle`.

use agent_bus_core::lifecycle;
use anyhow::{Context, Result};
use clap::Args;

use super::common::SessionOpt;

#[derive(Debug, Args)]
pub struct InitArgs {
    #[command(flatten)]
    pub session: SessionOpt,
}

pub fn execute(args: InitArgs) -> Result<()> {
    let layout = args.session.layout();
    lifecycle::init(&layout).context("failed to initialize session")?;
    println!("initialized session at {}", layout.root().display());
    Ok(())
}

#[derive(Debug, Args)]
pub struct CleanupArgs {
    #[command(flatten)]
    pub session: SessionOpt,
}

pub fn execute_cleanup(args: CleanupArgs) -> Result<()> {
    let layout = args.session.layout();
    lifecycle::cleanup(&layout).context("failed to clean up session")?;
    println!("removed session at {}", layout.root().display());
    Ok(())
}
