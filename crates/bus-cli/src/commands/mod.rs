//! The top-level `bus` argv dispatch: one `Commands` variant per
//! subcommand in the CLI surface, matched to its module's `execute*` fn.

pub mod agent;
pub mod chain;
pub mod common;
pub mod context;
pub mod cron;
pub mod external;
pub mod guard;
pub mod history;
pub mod inbox;
pub mod init;
pub mod lock;
pub mod log;
pub mod notify;
pub mod proc;
pub mod send;
pub mod session;
pub mod spawn;
pub mod status;
pub mod subscribe;
pub mod webhook;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "bus", about = "Agent coordination bus")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create a session's on-disk layout.
    Init(init::InitArgs),
    /// Deliver a message and fan it out to matching subscribers.
    Send(send::SendArgs),
    /// Peek or drain a role's inbox.
    Inbox(inbox::InboxArgs),
    /// External collaborator: the free-text memory store.
    Memory,
    /// Poll a role's inbox and print messages as they arrive.
    Watch(notify::WatchArgs),
    /// External collaborator: the terminal dashboard UI.
    Dashboard,
    /// Remove a session's on-disk state entirely.
    Cleanup(init::CleanupArgs),
    /// Poke a role's terminal pane via tmux.
    Notify(notify::NotifyArgs),
    /// Set a role's busy lock.
    Lock(lock::RoleArgs),
    /// Clear a role's busy lock.
    Unlock(lock::RoleArgs),
    /// Report a role's lock state; exits 1 when not locked.
    IsLocked(lock::RoleArgs),
    /// External collaborator: the tool-executor sandbox.
    Tools,
    /// List or manually dispatch event-chain rules.
    Chain(chain::ChainArgs),
    /// Record a command's completion and fire the event-chain router.
    Log(log::LogArgs),
    /// External collaborator: the embedded LLM prompt loader.
    Prompt,
    /// External collaborator: the skill markdown loader.
    Skill,
    /// Render a role's recent activity as a markdown prompt block.
    Context(context::ContextArgs),
    /// Show session root and per-role session metadata.
    Session(session::SessionArgs),
    /// Manage scheduled triggers.
    Cron(cron::CronArgs),
    /// Show a role's (or every role's) status snapshot.
    Status(status::StatusArgs),
    /// Show a role's command-execution history.
    History(history::HistoryArgs),
    /// Run the loop guard and compaction guard once, without cooldowns.
    Guard(guard::GuardArgs),
    /// Manage tracked background processes.
    Proc(proc::ProcArgs),
    /// Manage spawned subagents.
    Spawn(spawn::SpawnArgs),
    /// External collaborator: the demo-scenario runner.
    Demo,
    /// Inspect or stop the daemon's webhook ingress server.
    Webhook(webhook::WebhookArgs),
    /// Manage durable glob-pattern subscriptions.
    Subscribe(subscribe::SubscribeArgs),
    /// List the role registry: fixed roles plus live spawned roles.
    Agent(agent::AgentArgs),
    /// External collaborator: the outward-facing API surface.
    Api,
}

impl Cli {
    pub fn execute(self) -> Result<()> {
        match self.command {
            Commands::Init(a) => init::execute(a),
            Commands::Send(a) => send::execute(a),
            Commands::Inbox(a) => inbox::execute(a),
            Commands::Memory => external::execute("memory"),
            Commands::Watch(a) => notify::execute_watch(a),
            Commands::Dashboard => external::execute("dashboard"),
            Commands::Cleanup(a) => init::execute_cleanup(a),
            Commands::Notify(a) => notify::execute_notify(a),
            Commands::Lock(a) => lock::execute_lock(a),
            Commands::Unlock(a) => lock::execute_unlock(a),
            Commands::IsLocked(a) => lock::execute_is_locked(a),
            Commands::Tools => external::execute("tools"),
            Commands::Chain(a) => chain::execute(a),
            Commands::Log(a) => log::execute(a),
            Commands::Prompt => external::execute("prompt"),
            Commands::Skill => external::execute("skill"),
            Commands::Context(a) => context::execute(a),
            Commands::Session(a) => session::execute(a),
            Commands::Cron(a) => cron::execute(a),
            Commands::Status(a) => status::execute(a),
            Commands::History(a) => history::execute(a),
            Commands::Guard(a) => guard::execute(a),
            Commands::Proc(a) => proc::execute(a),
            Commands::Spawn(a) => spawn::execute(a),
            Commands::Demo => external::execute("demo"),
            Commands::Webhook(a) => webhook::execute(a),
            Commands::Subscribe(a) => subscribe::execute(a),
            Commands::Agent(a) => agent::execute(a),
            Commands::Api => external::execute("api"),
        }
    }
}
