//! Shared flag shapes and small helpers reused by every subcommand module.
//!
//! Grounded on `atm/src/commands/send.rs`'s `--team` env-default precedent,
//! generalized from team addressing to session addressing.

use agent_bus_core::layout::Layout;
use anyhow::Result;
use clap::Args;
use serde::Serialize;

pub const SESSION_ENV_VAR: &str = "BUS_SESSION";

#[derive(Debug, Args)]
pub struct SessionOpt {
    /// Session name; defaults to the `BUS_SESSION` env var, then "default".
    #[arg(long)]
    pub session: Option<String>,
}

impl SessionOpt {
    pub fn resolve(&self) -> String {
        self.session
            .clone()
            .or_else(|| std::env::var(SESSION_ENV_VAR).ok())
            .unwrap_or_else(|| "default".to_string())
    }

    pub fn layout(&self) -> Layout {
        Layout::new(&self.resolve())
    }
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
