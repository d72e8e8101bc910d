//! `chain`: list the built-in event-chain rules, or manually fire one for
//! testing (the same entry point `log` drives automatically on role
//! completion).

use agent_bus_core::chain::{self, Outcome, Router};
use anyhow::{bail, Result};
use clap::Args;

use super::common::SessionOpt;

#[derive(Debug, Args)]
pub struct ChainArgs {
    #[command(flatten)]
    pub session: SessionOpt,

    /// List the default rule table instead of dispatching one.
    #[arg(long)]
    pub all: bool,

    #[arg(long)]
    pub role: Option<String>,

    #[arg(long)]
    pub outcome: Option<String>,

    #[arg(long, default_value_t = 0)]
    pub exit_code: i32,

    #[arg(long, default_value = "")]
    pub command: String,
}

pub fn execute(args: ChainArgs) -> Result<()> {
    let rules = chain::default_rules();

    if args.all {
        for r in &rules {
            println!(
                "{} {:?} -> {} [{}]",
                r.role, r.outcome, r.action.send_to, r.action.action
            );
        }
        return Ok(());
    }

    let Some(role) = args.role else {
        bail!("--role is required unless --all is given");
    };
    let outcome = match args.outcome.as_deref() {
        Some("success") => Outcome::Success,
        Some("failure") => Outcome::Failure,
        _ => bail!("--outcome must be 'success' or 'failure'"),
    };

    let layout = args.session.layout();
    let router = Router::new(rules);
    router.dispatch(&layout, &role, outcome, args.exit_code, &args.command)?;
    println!("dispatched chain for {role} ({outcome:?})");
    Ok(())
}
