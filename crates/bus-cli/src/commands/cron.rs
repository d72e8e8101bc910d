//! `cron`: add, remove, enable/disable, or list scheduled entries.

use agent_bus_core::cron;
use agent_bus_core::io::entity_store;
use agent_bus_core::schema::entities::CronEntry;
use anyhow::Result;
use clap::{Args, Subcommand};

use super::common::{print_json, SessionOpt};

#[derive(Debug, Args)]
pub struct CronArgs {
    #[command(subcommand)]
    pub action: CronAction,
}

#[derive(Debug, Subcommand)]
pub enum CronAction {
    Add {
        #[command(flatten)]
        session: SessionOpt,
        #[arg(long)]
        target: String,
        #[arg(long)]
        schedule: String,
        #[arg(long)]
        action: String,
        #[arg(long, default_value = "")]
        message: String,
        #[arg(long, value_enum, default_value = "event")]
        r#type: super::send::MsgTypeArg,
    },
    Remove {
        #[command(flatten)]
        session: SessionOpt,
        #[arg(long)]
        id: String,
    },
    Enable {
        #[command(flatten)]
        session: SessionOpt,
        #[arg(long)]
        id: String,
    },
    Disable {
        #[command(flatten)]
        session: SessionOpt,
        #[arg(long)]
        id: String,
    },
    List {
        #[command(flatten)]
        session: SessionOpt,
        #[arg(long)]
        json: bool,
    },
}

pub fn execute(args: CronArgs) -> Result<()> {
    match args.action {
        CronAction::Add {
            session,
            target,
            schedule,
            action,
            message,
            r#type,
        } => {
            let id = cron::add(&session.layout(), &target, &schedule, &action, &message, r#type.into())?;
            println!("added cron entry {id}");
        }
        CronAction::Remove { session, id } => {
            cron::remove(&session.layout(), &id)?;
            println!("removed {id}");
        }
        CronAction::Enable { session, id } => {
            cron::set_enabled(&session.layout(), &id, true)?;
            println!("enabled {id}");
        }
        CronAction::Disable { session, id } => {
            cron::set_enabled(&session.layout(), &id, false)?;
            println!("disabled {id}");
        }
        CronAction::List { session, json } => {
            let entries: Vec<CronEntry> = entity_store::read_all(&session.layout().cron_jsonl())?;
            if json {
                print_json(&entries)?;
            } else if entries.is_empty() {
                println!("(no cron entries)");
            } else {
                for e in &entries {
                    println!(
                        "{} {} -> {} [{}] enabled={} runs={}",
                        e.id, e.schedule, e.target, e.action, e.enabled, e.run_count
                    );
                }
            }
        }
    }
    Ok(())
}
