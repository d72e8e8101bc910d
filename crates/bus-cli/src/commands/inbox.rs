//! `inbox`: peek (default) or drain a role's inbox.

use agent_bus_core::io::inbox;
use agent_bus_core::layout::is_known_role;
use anyhow::{bail, Context, Result};
use clap::Args;

use super::common::{print_json, SessionOpt};

#[derive(Debug, Args)]
pub struct InboxArgs {
    #[command(flatten)]
    pub session: SessionOpt,

    #[arg(long)]
    pub role: String,

    /// Drain the inbox instead of peeking at it.
    #[arg(long)]
    pub receive: bool,

    #[arg(long)]
    pub limit: Option<usize>,

    #[arg(long)]
    pub json: bool,
}

pub fn execute(args: InboxArgs) -> Result<()> {
    if !is_known_role(&args.role) {
        bail!("unknown role: {}", args.role);
    }
    let layout = args.session.layout();

    let mut messages = if args.receive {
        inbox::receive(&layout, &args.role).context("failed to drain inbox")?
    } else {
        inbox::peek(&layout, &args.role).context("failed to read inbox")?
    };

    if let Some(limit) = args.limit {
        if messages.len() > limit {
            messages = messages.split_off(messages.len() - limit);
        }
    }

    if args.json {
        print_json(&messages)?;
    } else if messages.is_empty() {
        println!("(empty)");
    } else {
        for m in &messages {
            println!("{} {} -> {} [{}] {}", m.ts, m.from, m.to, m.action, m.payload);
        }
    }
    Ok(())
}
