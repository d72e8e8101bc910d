//! `proc`: launch and supervise detached background processes.

use agent_bus_core::io::entity_store;
use agent_bus_core::proc_supervisor;
use agent_bus_core::schema::entities::ProcEntry;
use anyhow::Result;
use clap::{Args, Subcommand};

use super::common::{print_json, SessionOpt};

#[derive(Debug, Args)]
pub struct ProcArgs {
    #[command(subcommand)]
    pub action: ProcAction,
}

#[derive(Debug, Subcommand)]
pub enum ProcAction {
    Start {
        #[command(flatten)]
        session: SessionOpt,
        #[arg(long)]
        command: String,
        #[arg(long, default_value = ".")]
        dir: String,
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
    Clean {
        #[command(flatten)]
        session: SessionOpt,
    },
}

pub fn execute(args: ProcArgs) -> Result<()> {
    match args.action {
        ProcAction::Start {
            session,
            command,
            dir,
            owner,
        } => {
            let entry = proc_supervisor::start(&session.layout(), &command, &dir, &owner)?;
            println!("started proc {} (pid {})", entry.id, entry.pid);
        }
        ProcAction::Stop { session, id } => {
            proc_supervisor::stop(&session.layout(), &id)?;
            println!("stopped {id}");
        }
        ProcAction::List { session, json } => {
            let layout = session.layout();
            let entries: Vec<ProcEntry> = proc_supervisor::refresh(&layout)
                .or_else(|_| entity_store::read_all(&layout.proc_jsonl()))?;
            if json {
                print_json(&entries)?;
            } else if entries.is_empty() {
                println!("(no processes)");
            } else {
                for e in &entries {
                    println!(
                        "{} pid={} status={:?} owner={} {}",
                        e.id, e.pid, e.status, e.owner, e.command
                    );
                }
            }
        }
        ProcAction::Clean { session } => {
            let n = proc_supervisor::clean_finished(&session.layout())?;
            println!("removed {n} finished entries");
        }
    }
    Ok(())
}
