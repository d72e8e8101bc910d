//! `notify`: poke a role's terminal pane; `watch`: tail a role's traffic.
//!
//! Pane-poke idiom grounded on `bus-daemon::watcher`'s `notify_pane` (shell
//! out to `tmux send-keys ... Enter`, tmux-unavailable is not fatal).
//! `watch` is grounded on `atm`'s `Tail` subcommand: poll and print new
//! lines rather than hold a long-lived subscription.

use std::process::Command;
use std::time::Duration;

use agent_bus_core::io::inbox;
use agent_bus_core::layout::is_known_role;
use anyhow::{bail, Result};
use clap::Args;

use super::common::SessionOpt;

#[derive(Debug, Args)]
pub struct NotifyArgs {
    #[command(flatten)]
    pub session: SessionOpt,

    #[arg(long)]
    pub role: String,
}

pub fn execute_notify(args: NotifyArgs) -> Result<()> {
    if !is_known_role(&args.role) {
        bail!("unknown role: {}", args.role);
    }
    let result = Command::new("tmux")
        .args(["send-keys", "-t", &args.role, "Enter"])
        .output();
    match result {
        Ok(_) => println!("notified {}", args.role),
        Err(e) => println!("pane notify skipped, tmux unavailable: {e}"),
    }
    let _ = agent_bus_core::io::trigger::fire(&args.session.layout());
    Ok(())
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    #[command(flatten)]
    pub session: SessionOpt,

    #[arg(long)]
    pub role: String,

    /// Poll interval in milliseconds.
    #[arg(long, default_value_t = 1000)]
    pub interval_ms: u64,
}

/// Polls the role's inbox at `interval_ms` and prints messages as they
/// arrive. Runs until interrupted (Ctrl+C); intended for an operator's
/// terminal, not for scripting.
pub fn execute_watch(args: WatchArgs) -> Result<()> {
    if !is_known_role(&args.role) {
        bail!("unknown role: {}", args.role);
    }
    let layout = args.session.layout();
    println!("watching inbox for {} (ctrl-c to stop)", args.role);
    loop {
        let drained = inbox::receive(&layout, &args.role)?;
        for m in &drained {
            println!("{} {} -> {} [{}] {}", m.ts, m.from, m.to, m.action, m.payload);
        }
        std::thread::sleep(Duration::from_millis(args.interval_ms));
    }
}
