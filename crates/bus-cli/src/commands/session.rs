//! `session`: show the session root and per-role session metadata.

use agent_bus_core::layout::{is_known_role, KNOWN_ROLES};
use agent_bus_core::schema::entities::SessionMeta;
use anyhow::{bail, Result};
use clap::Args;

use super::common::{print_json, SessionOpt};

#[derive(Debug, Args)]
pub struct SessionArgs {
    #[command(flatten)]
    pub session: SessionOpt,

    #[arg(long)]
    pub role: Option<String>,

    #[arg(long)]
    pub json: bool,
}

fn read_meta(path: &std::path::Path) -> Option<SessionMeta> {
    let contents = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&contents).ok()
}

pub fn execute(args: SessionArgs) -> Result<()> {
    let layout = args.session.layout();

    let roles: Vec<String> = match &args.role {
        Some(r) => {
            if !is_known_role(r) {
                bail!("unknown role: {r}");
            }
            vec![r.clone()]
        }
        None => KNOWN_ROLES.iter().map(|r| r.to_string()).collect(),
    };

    let report: Vec<serde_json::Value> = roles
        .iter()
        .map(|role| {
            let meta = read_meta(&layout.session_meta(role));
            serde_json::json!({ "role": role, "meta": meta })
        })
        .collect();

    if args.json {
        print_json(&report)?;
    } else {
        println!("session root: {}", layout.root().display());
        for (role, entry) in roles.iter().zip(report.iter()) {
            println!("{role}: {}", entry["meta"]);
        }
    }
    Ok(())
}
