//! `log`: the tool-executor's completion report. Appends a history entry
//! and is the *only* path that fires the event-chain router (see
//! DESIGN.md's subscription-vs-chain decision).

use agent_bus_core::chain::{Outcome, Router};
use agent_bus_core::io::entity_store;
use agent_bus_core::layout::is_known_role;
use agent_bus_core::loop_guard::HistoryEntry;
use anyhow::{bail, Result};
use clap::Args;

use super::common::SessionOpt;

#[derive(Debug, Args)]
pub struct LogArgs {
    #[command(flatten)]
    pub session: SessionOpt,

    #[arg(long)]
    pub role: String,

    #[arg(long)]
    pub command: String,

    #[arg(long, default_value = "")]
    pub summary: String,

    #[arg(long)]
    pub exit_code: i32,

    #[arg(long, default_value = "")]
    pub output: String,
}

fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

pub fn execute(args: LogArgs) -> Result<()> {
    if !is_known_role(&args.role) {
        bail!("unknown role: {}", args.role);
    }
    let layout = args.session.layout();
    let outcome = if args.exit_code == 0 { "success" } else { "failure" };

    let entry = HistoryEntry {
        ts: now_unix(),
        command: args.command.clone(),
        summary: args.summary.clone(),
        exit_code: args.exit_code,
        outcome: outcome.to_string(),
        output: args.output.clone(),
    };
    entity_store::mutate::<HistoryEntry, _>(&layout.role_history_jsonl(&args.role), |v| {
        v.push(entry)
    })?;

    let router = Router::new(agent_bus_core::chain::default_rules());
    let chain_outcome = if args.exit_code == 0 {
        Outcome::Success
    } else {
        Outcome::Failure
    };
    router.dispatch(&layout, &args.role, chain_outcome, args.exit_code, &args.command)?;

    println!("logged {} ({outcome})", args.role);
    Ok(())
}
