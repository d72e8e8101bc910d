//! `webhook`: inspect or stop the daemon's webhook ingress server.
//!
//! The server itself only runs inside the daemon's tokio runtime
//! (`bus-daemon::webhook::run`); this command just reads the `<port>:<pid>`
//! marker it writes via `Layout::webhook_pid` and can signal it to stop.

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};

use super::common::SessionOpt;

#[derive(Debug, Args)]
pub struct WebhookArgs {
    #[command(subcommand)]
    pub action: WebhookAction,
}

#[derive(Debug, Subcommand)]
pub enum WebhookAction {
    Status {
        #[command(flatten)]
        session: SessionOpt,
    },
    Stop {
        #[command(flatten)]
        session: SessionOpt,
    },
}

fn read_marker(layout: &agent_bus_core::Layout) -> Result<(u16, i32)> {
    let raw = std::fs::read_to_string(layout.webhook_pid()).context("webhook is not running")?;
    let (port, pid) = raw.split_once(':').context("malformed webhook pid marker")?;
    Ok((port.parse()?, pid.parse()?))
}

pub fn execute(args: WebhookArgs) -> Result<()> {
    match args.action {
        WebhookAction::Status { session } => match read_marker(&session.layout()) {
            Ok((port, pid)) => println!("listening on port {port} (pid {pid})"),
            Err(_) => println!("not running"),
        },
        WebhookAction::Stop { session } => {
            let (_, pid) = read_marker(&session.layout())?;
            #[cfg(unix)]
            {
                let result = unsafe { libc::kill(pid, libc::SIGTERM) };
                if result != 0 {
                    bail!("failed to signal webhook process {pid}");
                }
            }
            let _ = std::fs::remove_file(session.layout().webhook_pid());
            println!("stopped webhook (pid {pid})");
        }
    }
    Ok(())
}
