//! Background daemon for agent-bus: cron, process supervision, spawn
//! supervision, the watcher tick loop, and webhook ingress, all under one
//! cancellation token.
//!
//! Grounded on `atm-daemon::main` for the overall shape (clap args, tracing
//! init, signal-handler task cancelling a shared `CancellationToken`, then
//! awaiting the daemon body) — simplified from a plugin registry to a fixed
//! set of cooperative tasks since this daemon doesn't load plugins.

mod watcher;
mod webhook;

use std::path::PathBuf;

use agent_bus_core::config::Config;
use agent_bus_core::layout::Layout;
use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "bus-daemon")]
#[command(about = "Background service for the agent-bus coordination bus")]
#[command(version)]
struct Args {
    /// Session name to serve (default: "default")
    #[arg(long, value_name = "NAME", default_value = "default")]
    session: String,

    /// Path to a TOML config file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Disable the webhook HTTP listener
    #[arg(long)]
    no_webhook: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.verbose && std::env::var_os("BUS_LOG").is_none() {
        unsafe {
            std::env::set_var("BUS_LOG", "debug");
        }
    }
    agent_bus_core::logging::init();

    info!("agent-bus daemon starting");

    let layout = Layout::new(&args.session);
    agent_bus_core::lifecycle::init(&layout).context("failed to initialize session layout")?;

    let config = Config::resolve(args.config.as_deref()).context("failed to resolve configuration")?;
    info!(session = %args.session, root = %layout.root().display(), "session layout ready");

    let cancel_token = CancellationToken::new();

    let cancel_for_signals = cancel_token.clone();
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
            tokio::select! {
                _ = ctrl_c => info!("received SIGINT"),
                _ = sigterm.recv() => info!("received SIGTERM"),
            }
        }
        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("received Ctrl+C");
        }

        cancel_for_signals.cancel();
    });

    let watcher_layout = layout.clone();
    let watcher_config = config.clone();
    let watcher_cancel = cancel_token.clone();
    let watcher_task = tokio::spawn(async move {
        watcher::run(watcher_layout, watcher_config, watcher_cancel).await;
    });

    let webhook_task = if args.no_webhook {
        None
    } else {
        let webhook_layout = layout.clone();
        let webhook_config = config.clone();
        let webhook_session = args.session.clone();
        let webhook_cancel = cancel_token.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = webhook::run(webhook_layout, webhook_config, webhook_session, webhook_cancel).await {
                tracing::error!(error = %e, "webhook server exited with error");
            }
        }))
    };

    watcher_task.await.context("watcher task panicked")?;
    if let Some(task) = webhook_task {
        task.await.context("webhook task panicked")?;
    }

    info!("agent-bus daemon shutdown complete");
    Ok(())
}
