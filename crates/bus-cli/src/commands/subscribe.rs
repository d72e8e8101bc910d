//! `subscribe`: durable glob-pattern subscriptions, fanned out on every send.

use agent_bus_core::io::entity_store;
use agent_bus_core::schema::entities::Subscription;
use agent_bus_core::subscriptions;
use anyhow::Result;
use clap::{Args, Subcommand};

use super::common::{print_json, SessionOpt};

#[derive(Debug, Args)]
pub struct SubscribeArgs {
    #[command(subcommand)]
    pub action: SubscribeAction,
}

#[derive(Debug, Subcommand)]
pub enum SubscribeAction {
    Add {
        #[command(flatten)]
        session: SessionOpt,
        #[arg(long)]
        role: String,
        #[arg(long, default_value = "*")]
        action_glob: String,
        #[arg(long, default_value = "*")]
        source_glob: String,
    },
    Remove {
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

pub fn execute(args: SubscribeArgs) -> Result<()> {
    match args.action {
        SubscribeAction::Add {
            session,
            role,
            action_glob,
            source_glob,
        } => {
            let id = subscriptions::subscribe(&session.layout(), &role, &action_glob, &source_glob)?;
            println!("subscribed {id}");
        }
        SubscribeAction::Remove { session, id } => {
            subscriptions::unsubscribe(&session.layout(), &id)?;
            println!("removed {id}");
        }
        SubscribeAction::List { session, json } => {
            let entries: Vec<Subscription> = entity_store::read_all(&session.layout().subscriptions_jsonl())?;
            if json {
                print_json(&entries)?;
            } else if entries.is_empty() {
                println!("(no subscriptions)");
            } else {
                for s in &entries {
                    println!(
                        "{} {} action={} source={} enabled={}",
                        s.id, s.subscriber_role, s.event_action_glob, s.source_role_glob, s.enabled
                    );
                }
            }
        }
    }
    Ok(())
}
