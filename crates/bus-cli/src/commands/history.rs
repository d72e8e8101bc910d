//! `history`: a role's command-execution history.

use agent_bus_core::io::entity_store;
use agent_bus_core::layout::is_known_role;
use agent_bus_core::loop_guard::HistoryEntry;
use anyhow::{bail, Result};
use clap::Args;

use super::common::{print_json, SessionOpt};

#[derive(Debug, Args)]
pub struct HistoryArgs {
    #[command(flatten)]
    pub session: SessionOpt,

    #[arg(long)]
    pub role: String,

    #[arg(long)]
    pub limit: Option<usize>,

    #[arg(long)]
    pub json: bool,
}

pub fn execute(args: HistoryArgs) -> Result<()> {
    if !is_known_role(&args.role) {
        bail!("unknown role: {}", args.role);
    }
    let layout = args.session.layout();
    let mut entries: Vec<HistoryEntry> = entity_store::read_all(&layout.role_history_jsonl(&args.role))?;

    if let Some(limit) = args.limit {
        if entries.len() > limit {
            entries = entries.split_off(entries.len() - limit);
        }
    }

    if args.json {
        print_json(&entries)?;
    } else if entries.is_empty() {
        println!("(no history)");
    } else {
        for e in &entries {
            println!("{} [{}] {} ({})", e.ts, e.outcome, e.command, e.exit_code);
        }
    }
    Ok(())
}
