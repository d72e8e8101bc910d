//! `guard`: run the loop guard and compaction guard once for a role (or
//! every role) and print any alert, without the watcher's cooldown
//! suppression — a manual inspection command rather than the autonomous
//! tick loop's copy of the same checks.

use agent_bus_core::config::Config;
use agent_bus_core::layout::{is_known_role, KNOWN_ROLES};
use agent_bus_core::schema::entities::SessionMeta;
use agent_bus_core::schema::message::Message;
use agent_bus_core::{compaction_guard, io::entity_store, loop_guard};
use anyhow::{bail, Context, Result};
use clap::Args;

use super::common::SessionOpt;

#[derive(Debug, Args)]
pub struct GuardArgs {
    #[command(flatten)]
    pub session: SessionOpt,

    #[arg(long)]
    pub role: Option<String>,

    #[arg(long)]
    pub all: bool,
}

fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

fn read_log(layout: &agent_bus_core::Layout) -> Vec<Message> {
    std::fs::read_to_string(layout.log_jsonl())
        .map(|c| c.lines().filter_map(|l| Message::from_line(l).ok()).collect())
        .unwrap_or_default()
}

pub fn execute(args: GuardArgs) -> Result<()> {
    let layout = args.session.layout();
    let config = Config::resolve(None).context("failed to resolve configuration")?;
    let now = now_unix();
    let log = read_log(&layout);

    let roles: Vec<String> = match &args.role {
        Some(r) if !args.all => {
            if !is_known_role(r) {
                bail!("unknown role: {r}");
            }
            vec![r.clone()]
        }
        _ => KNOWN_ROLES.iter().map(|r| r.to_string()).collect(),
    };

    let mut fired = 0;
    for role in &roles {
        let history = entity_store::read_all(&layout.role_history_jsonl(role)).unwrap_or_default();
        if let Some(alert) = loop_guard::detect_command_loop(
            &history,
            role,
            config.loop_guard.command_threshold,
            config.loop_guard.window_secs,
        ) {
            println!("[{role}] command loop: {} (x{})", alert.detail, alert.count);
            fired += 1;
        }
        if let Some(alert) = loop_guard::detect_message_loop(
            &log,
            role,
            config.loop_guard.message_threshold,
            config.loop_guard.window_secs,
        ) {
            println!("[{role}] message loop: {} (x{})", alert.detail, alert.count);
            fired += 1;
        }

        let meta: SessionMeta = std::fs::read_to_string(layout.session_meta(role))
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default();
        let total = compaction_guard::role_total_bytes(&layout, role, 0, 0);
        if let Some(alert) = compaction_guard::check(
            role,
            total,
            &meta,
            now,
            config.compaction_guard.size_threshold_bytes,
            config.compaction_guard.age_threshold_hours,
        ) {
            println!(
                "[{role}] compaction recommended: {} bytes, {:.1}h since last compact",
                alert.total_bytes, alert.hours_since_compact
            );
            fired += 1;
        }
    }

    if fired == 0 {
        println!("no alerts");
    }
    Ok(())
}
