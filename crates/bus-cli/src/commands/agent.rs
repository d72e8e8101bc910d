//! `agent`: list the role registry — the fixed roles plus any live
//! dynamically-spawned `spawn-<hex>` roles found in `spawn.jsonl`.

use agent_bus_core::io::entity_store;
use agent_bus_core::layout::KNOWN_ROLES;
use agent_bus_core::schema::entities::{SpawnEntry, SpawnStatus};
use anyhow::Result;
use clap::Args;
use serde::Serialize;

use super::common::{print_json, SessionOpt};

#[derive(Debug, Args)]
pub struct AgentArgs {
    #[command(flatten)]
    pub session: SessionOpt,

    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct AgentRole {
    role: String,
    kind: &'static str,
}

pub fn execute(args: AgentArgs) -> Result<()> {
    let layout = args.session.layout();
    let mut roles: Vec<AgentRole> = KNOWN_ROLES
        .iter()
        .map(|r| AgentRole {
            role: r.to_string(),
            kind: "fixed",
        })
        .collect();

    let spawns: Vec<SpawnEntry> = entity_store::read_all(&layout.spawn_jsonl()).unwrap_or_default();
    for s in spawns.into_iter().filter(|s| s.status == SpawnStatus::Running) {
        roles.push(AgentRole {
            role: s.spawn_role,
            kind: "spawned",
        });
    }

    if args.json {
        print_json(&roles)?;
    } else {
        for r in &roles {
            println!("{} ({})", r.role, r.kind);
        }
    }
    Ok(())
}
