//! `context`: render a role's recent activity as a markdown block suitable
//! for injecting into an agent's prompt, via `bus-core::inspector`.

use agent_bus_core::inspector;
use agent_bus_core::layout::is_known_role;
use anyhow::{bail, Result};
use clap::Args;

use super::common::SessionOpt;

#[derive(Debug, Args)]
pub struct ContextArgs {
    #[command(flatten)]
    pub session: SessionOpt,

    #[arg(long)]
    pub role: String,

    #[arg(long, default_value_t = 10)]
    pub limit: usize,
}

pub fn execute(args: ContextArgs) -> Result<()> {
    if !is_known_role(&args.role) {
        bail!("unknown role: {}", args.role);
    }
    let layout = args.session.layout();
    print!("{}", inspector::extract_context(&layout, &args.role, args.limit));
    Ok(())
}
