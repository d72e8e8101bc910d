//! `status`: per-role snapshot via `bus-core::inspector`.

use agent_bus_core::inspector;
use agent_bus_core::layout::{is_known_role, KNOWN_ROLES};
use anyhow::{bail, Result};
use clap::Args;

use super::common::{print_json, SessionOpt};

#[derive(Debug, Args)]
pub struct StatusArgs {
    #[command(flatten)]
    pub session: SessionOpt,

    #[arg(long)]
    pub role: Option<String>,

    #[arg(long)]
    pub all: bool,

    #[arg(long)]
    pub json: bool,
}

pub fn execute(args: StatusArgs) -> Result<()> {
    let layout = args.session.layout();

    let statuses = if args.all || args.role.is_none() {
        inspector::status_all(&layout, KNOWN_ROLES)
    } else {
        let role = args.role.as_deref().unwrap();
        if !is_known_role(role) {
            bail!("unknown role: {role}");
        }
        vec![inspector::status(&layout, role)]
    };

    if args.json {
        print_json(&statuses)?;
    } else {
        for s in &statuses {
            println!(
                "{:<10} locked={:<5} inbox={:<3} last_action={}",
                s.role,
                s.locked,
                s.inbox_count,
                s.last_action.as_deref().unwrap_or("-")
            );
        }
    }
    Ok(())
}
