//! `spawn`: launch a role into its own tmux window and track its lifecycle.

use agent_bus_core::io::entity_store;
use agent_bus_core::schema::entities::SpawnEntry;
use agent_bus_core::spawn_supervisor;
use anyhow::Result;
use clap::{Args, Subcommand};

use super::common::{print_json, SessionOpt};

#[derive(Debug, Args)]
pub struct SpawnArgs {
    #[command(subcommand)]
    pub action: SpawnAction,
}

#[derive(Debug, Subcommand)]
pub enum SpawnAction {
    Start {
        #[command(flatten)]
        session: SessionOpt,
        #[arg(long)]
        role: String,
        #[arg(long)]
        task: String,
        #[arg(long)]
        owner: String,
    },
    Stop {
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
    Result {
        #[command(flatten)]
        session: SessionOpt,
        #[arg(long)]
        role: String,
        #[arg(long)]
        json: bool,
    },
}

pub fn execute(args: SpawnArgs) -> Result<()> {
    match args.action {
        SpawnAction::Start {
            session,
            role,
            task,
            owner,
        } => {
            let entry = spawn_supervisor::start(&session.layout(), &role, &task, &owner)?;
            println!("spawned {} into window {}", entry.spawn_role, entry.window);
        }
        SpawnAction::Stop { session, id } => {
            spawn_supervisor::stop(&session.layout(), &id)?;
            println!("stopped {id}");
        }
        SpawnAction::List { session, json } => {
            let layout = session.layout();
            let entries: Vec<SpawnEntry> = spawn_supervisor::refresh(&layout)
                .or_else(|_| entity_store::read_all(&layout.spawn_jsonl()))?;
            if json {
                print_json(&entries)?;
            } else if entries.is_empty() {
                println!("(no spawns)");
            } else {
                for e in &entries {
                    println!(
                        "{} role={} status={:?} window={}",
                        e.id, e.spawn_role, e.status, e.window
                    );
                }
            }
        }
        SpawnAction::Result { session, role, json } => {
            match spawn_supervisor::result(&session.layout(), &role)? {
                Some(message) => {
                    if json {
                        print_json(&message)?;
                    } else {
                        println!("{}: {}", message.from, message.payload);
                    }
                }
                None => println!("(no result yet)"),
            }
        }
    }
    Ok(())
}
