//! `lock`, `unlock`, `is-locked`: the presence-only busy flag.

use agent_bus_core::io::lock_signal;
use agent_bus_core::layout::is_known_role;
use anyhow::{bail, Context, Result};
use clap::Args;

use super::common::SessionOpt;

#[derive(Debug, Args)]
pub struct RoleArgs {
    #[command(flatten)]
    pub session: SessionOpt,

    #[arg(long)]
    pub role: String,
}

pub fn execute_lock(args: RoleArgs) -> Result<()> {
    if !is_known_role(&args.role) {
        bail!("unknown role: {}", args.role);
    }
    lock_signal::lock(&args.session.layout(), &args.role).context("failed to set lock")?;
    println!("locked {}", args.role);
    Ok(())
}

pub fn execute_unlock(args: RoleArgs) -> Result<()> {
    if !is_known_role(&args.role) {
        bail!("unknown role: {}", args.role);
    }
    let layout = args.session.layout();
    lock_signal::unlock(&layout, &args.role).context("failed to clear lock")?;
    let _ = agent_bus_core::io::trigger::fire(&layout);
    println!("unlocked {}", args.role);
    Ok(())
}

/// Prints the lock state and exits 0/1 on it directly, shell-`test` style,
/// so scripts can branch on the exit code without parsing stdout.
pub fn execute_is_locked(args: RoleArgs) -> Result<()> {
    if !is_known_role(&args.role) {
        bail!("unknown role: {}", args.role);
    }
    let locked = lock_signal::is_locked(&args.session.layout(), &args.role);
    println!("{locked}");
    if locked {
        Ok(())
    } else {
        std::process::exit(1);
    }
}
