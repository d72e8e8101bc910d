//! Core library for the agent coordination bus: on-disk layout, message
//! schema, inbox engine, lock signal, role registry, event-chain router,
//! loop guard, compaction guard, session lifecycle, and the cron/process/
//! spawn/subscription engines shared by the daemon and the CLI.

pub mod chain;
pub mod compaction_guard;
pub mod config;
pub mod cron;
pub mod event_log;
pub mod inspector;
pub mod io;
pub mod layout;
pub mod lifecycle;
pub mod logging;
pub mod loop_guard;
pub mod proc_supervisor;
pub mod registry;
pub mod schema;
pub mod spawn_supervisor;
pub mod subscriptions;

pub use config::Config;
pub use io::error::BusError;
pub use layout::Layout;
pub use schema::message::Message;
