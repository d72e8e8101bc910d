//! Watcher (component M): the single-threaded cooperative tick loop that
//! drives inbox notifications, proc/spawn refresh, the guards, and the
//! embedded-LLM health probe.
//!
//! Grounded on `atm-daemon::daemon::{event_loop, watcher, spool_task}`: a
//! `tokio::select!` loop over a `tokio::time::interval` plus a
//! notify-backed channel (`watch_inboxes` bridges a synchronous `notify`
//! channel into async with `spawn_blocking`, which is reused here for the
//! trigger file instead of a whole team directory).

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Command;
use std::sync::mpsc::channel as std_channel;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use agent_bus_core::compaction_guard;
use agent_bus_core::config::Config;
use agent_bus_core::io::{entity_store, inbox};
use agent_bus_core::layout::{Layout, KNOWN_ROLES};
use agent_bus_core::loop_guard::{self, Alert, CooldownMap, HistoryEntry};
use agent_bus_core::schema::entities::{ProcEntry, SessionMeta, SpawnEntry};
use agent_bus_core::schema::message::{Message, MessageType};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use agent_bus_core::{cron, proc_supervisor, spawn_supervisor};

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Best-effort pane-keys poke so a role's agent notices new inbox content.
/// Absent tmux or a missing window is not fatal: the next inbox receive
/// still picks the message up on its own schedule.
fn notify_pane(role: &str) {
    let result = Command::new("tmux")
        .args(["send-keys", "-t", role, "Enter"])
        .output();
    if let Err(e) = result {
        debug!(role, error = %e, "pane notify skipped, tmux unavailable");
    }
}

fn read_history(layout: &Layout, role: &str) -> Vec<HistoryEntry> {
    entity_store::read_all(&layout.role_history_jsonl(role)).unwrap_or_default()
}

fn read_log(layout: &Layout) -> Vec<Message> {
    match std::fs::read_to_string(layout.log_jsonl()) {
        Ok(contents) => contents
            .lines()
            .filter(|l| !l.trim().is_empty())
            .filter_map(|l| Message::from_line(l).ok())
            .collect(),
        Err(_) => Vec::new(),
    }
}

fn deliver_alert(layout: &Layout, alert: &Alert) {
    let msg = Message::new(
        "watcher",
        "analyst",
        MessageType::Event,
        "loop-alert",
        &format!("{:?} {} (count={})", alert.kind, alert.detail, alert.count),
    );
    if let Err(e) = inbox::send_no_cc(layout, &msg) {
        warn!(error = %e, "failed to deliver loop-guard alert");
    }
}

fn deliver_compaction_alert(layout: &Layout, alert: &compaction_guard::CompactionAlert) {
    let msg = Message::new(
        "watcher",
        "analyst",
        MessageType::Event,
        "compaction-alert",
        &format!(
            "role {} at {} bytes, {:.1}h since last compact",
            alert.role, alert.total_bytes, alert.hours_since_compact
        ),
    );
    if let Err(e) = inbox::send_no_cc(layout, &msg) {
        warn!(error = %e, "failed to deliver compaction alert");
    }
}

fn run_guards(layout: &Layout, config: &Config, cooldowns: &mut CooldownMap) {
    let now = now_unix();
    let log = read_log(layout);

    for role in KNOWN_ROLES {
        let history = read_history(layout, role);
        if let Some(alert) = loop_guard::detect_command_loop(
            &history,
            role,
            config.loop_guard.command_threshold,
            config.loop_guard.window_secs,
        ) {
            if cooldowns.should_emit(&alert.key, now) {
                deliver_alert(layout, &alert);
            }
        }
        if let Some(alert) = loop_guard::detect_message_loop(
            &log,
            role,
            config.loop_guard.message_threshold,
            config.loop_guard.window_secs,
        ) {
            if cooldowns.should_emit(&alert.key, now) {
                deliver_alert(layout, &alert);
            }
        }

        let meta_path = layout.session_meta(role);
        let meta: SessionMeta = std::fs::read_to_string(&meta_path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default();
        let total = compaction_guard::role_total_bytes(layout, role, 0, 0);
        if let Some(alert) = compaction_guard::check(
            role,
            total,
            &meta,
            now,
            config.compaction_guard.size_threshold_bytes,
            config.compaction_guard.age_threshold_hours,
        ) {
            if cooldowns.should_emit(&alert.key, now) {
                deliver_compaction_alert(layout, &alert);
            }
        }
    }
}

fn notify_proc_completion(layout: &Layout, entry: &ProcEntry) {
    let msg = Message::new(
        "watcher",
        &entry.owner,
        MessageType::Event,
        "proc-complete",
        &format!("{} exited with status {:?} (code {})", entry.id, entry.status, entry.exit_code),
    );
    if inbox::send_no_cc(layout, &msg).is_ok() {
        let _ = entity_store::mutate::<ProcEntry, _>(&layout.proc_jsonl(), |v| {
            for e in v.iter_mut() {
                if e.id == entry.id {
                    e.notified = true;
                }
            }
        });
        notify_pane(&entry.owner);
    }
}

fn notify_spawn_completion(layout: &Layout, entry: &SpawnEntry) {
    let result = spawn_supervisor::result(layout, &entry.spawn_role)
        .ok()
        .flatten();
    let summary = result
        .map(|m| m.payload)
        .unwrap_or_else(|| "(no output captured)".to_string());
    let msg = Message::new(
        "watcher",
        &entry.owner,
        MessageType::Event,
        "spawn-complete",
        &summary,
    );
    if inbox::send_no_cc(layout, &msg).is_ok() {
        let _ = entity_store::mutate::<SpawnEntry, _>(&layout.spawn_jsonl(), |v| {
            for e in v.iter_mut() {
                if e.id == entry.id {
                    e.notified = true;
                }
            }
        });
        notify_pane(&entry.owner);
    }
}

fn run_proc_spawn_refresh(layout: &Layout) {
    match proc_supervisor::refresh(layout) {
        Ok(completed) => {
            for entry in completed.iter().filter(|e| !e.notified) {
                notify_proc_completion(layout, entry);
            }
        }
        Err(e) => warn!(error = %e, "proc refresh failed"),
    }
    match spawn_supervisor::refresh(layout) {
        Ok(completed) => {
            for entry in completed.iter().filter(|e| !e.notified) {
                notify_spawn_completion(layout, entry);
            }
        }
        Err(e) => warn!(error = %e, "spawn refresh failed"),
    }
}

fn probe_llm(url: &str, timeout: Duration) -> bool {
    let client = match reqwest::blocking::Client::builder().timeout(timeout).build() {
        Ok(c) => c,
        Err(_) => return false,
    };
    client
        .get(format!("{url}/api/tags"))
        .send()
        .map(|r| r.status().is_success())
        .unwrap_or(false)
}

async fn run_llm_probe(layout: &Layout, config: &Config, strikes: &mut HashMap<String, u32>) {
    let url = config.llm.url.clone();
    let timeout = Duration::from_secs(config.llm.probe_timeout_secs);
    let ok = tokio::task::spawn_blocking(move || probe_llm(&url, timeout))
        .await
        .unwrap_or(false);
    let key = "watcher".to_string();
    if ok {
        if strikes.remove(&key).is_some() {
            for role in KNOWN_ROLES {
                let _ = std::fs::remove_file(layout.ollama_fail_sentinel(role));
            }
            let msg = Message::new("watcher", "analyst", MessageType::Event, "llm-recovered", &config.llm.url);
            let _ = inbox::send_no_cc(layout, &msg);
        }
        return;
    }

    let count = strikes.entry(key).or_insert(0);
    *count += 1;
    if *count >= config.llm.failure_strikes {
        let now = now_unix();
        for role in KNOWN_ROLES {
            let sentinel = layout.ollama_fail_sentinel(role);
            let _ = std::fs::write(&sentinel, format!("{count} {now}"));
        }
    }
}

/// Bridges a `notify` watch on the session's trigger file into an async
/// channel the select loop can poll alongside the regular tick.
fn spawn_trigger_watch(trigger_path: PathBuf, cancel: CancellationToken) -> mpsc::Receiver<()> {
    let (tx, rx) = mpsc::channel(8);
    let (std_tx, std_rx) = std_channel();

    let watcher: notify::Result<RecommendedWatcher> =
        notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            if let Ok(event) = res {
                let _ = std_tx.send(event);
            }
        });
    let mut watcher = match watcher {
        Ok(w) => w,
        Err(e) => {
            warn!(error = %e, "trigger watcher unavailable, falling back to tick-only wakeups");
            return rx;
        }
    };
    if let Some(parent) = trigger_path.parent() {
        let _ = std::fs::create_dir_all(parent);
        if let Err(e) = watcher.watch(parent, RecursiveMode::NonRecursive) {
            warn!(error = %e, "failed to watch trigger directory");
        }
    }

    tokio::task::spawn_blocking(move || {
        let _watcher = watcher;
        loop {
            if cancel.is_cancelled() {
                break;
            }
            match std_rx.recv_timeout(Duration::from_millis(200)) {
                Ok(event) => {
                    if event.paths.iter().any(|p| p == &trigger_path) && tx.blocking_send(()).is_err() {
                        break;
                    }
                }
                Err(std::sync::mpsc::RecvTimeoutError::Timeout) => continue,
                Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }
    });
    rx
}

fn run_inbox_pass(layout: &Layout) {
    for role in KNOWN_ROLES {
        let marker = layout.notified_size_marker(role);
        let last_size: u64 = std::fs::read_to_string(&marker)
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0);
        let current_size = inbox::inbox_size(layout, role);
        if current_size > last_size {
            notify_pane(role);
            let _ = std::fs::write(&marker, current_size.to_string());
        } else if current_size < last_size {
            // Inbox was drained since the last check; reset the marker so
            // the next growth is detected from zero.
            let _ = std::fs::write(&marker, current_size.to_string());
        }
    }
}

/// Runs the watcher loop until `cancel` fires. Never blocks longer than one
/// tick between cancellation checks.
pub async fn run(layout: Layout, config: Config, cancel: CancellationToken) {
    let tick = config.watcher.tick();
    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let mut trigger_rx = spawn_trigger_watch(layout.trigger_file(), cancel.clone());
    let mut cooldowns = CooldownMap::new(config.loop_guard.cooldown_secs);
    let mut llm_strikes: HashMap<String, u32> = HashMap::new();
    let mut tick_count: u64 = 0;

    info!(tick_ms = tick.as_millis() as u64, "watcher loop starting");

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = trigger_rx.recv() => {}
            _ = cancel.cancelled() => {
                info!("watcher loop cancelled");
                break;
            }
        }

        tick_count += 1;
        agent_bus_core::io::trigger::drain(&layout);
        run_inbox_pass(&layout);

        if tick_count % config.watcher.proc_refresh_every_ticks as u64 == 0 {
            run_proc_spawn_refresh(&layout);
            if let Err(e) = cron::run_tick(&layout) {
                warn!(error = %e, "cron tick failed");
            }
        }

        if tick_count % config.watcher.guard_every_ticks as u64 == 0 {
            run_guards(&layout, &config, &mut cooldowns);
        }

        if tick_count % config.watcher.llm_probe_every_ticks as u64 == 0 {
            run_llm_probe(&layout, &config, &mut llm_strikes).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn inbox_pass_notifies_pane_dependent_side_effects_are_skipped_without_tmux() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::from_root(dir.path());
        let msg = Message::new("edit", "build", MessageType::Request, "compile", "go");
        inbox::send_no_cc(&layout, &msg).unwrap();
        run_inbox_pass(&layout);
        let marker = std::fs::read_to_string(layout.notified_size_marker("build")).unwrap();
        assert!(marker.trim().parse::<u64>().unwrap() > 0);
    }

    #[tokio::test]
    async fn llm_probe_writes_sentinel_after_threshold_strikes() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::from_root(dir.path());
        agent_bus_core::lifecycle::init(&layout).unwrap();
        let mut config = Config::default();
        config.llm.url = "http://127.0.0.1:1".to_string();
        config.llm.failure_strikes = 2;
        config.llm.probe_timeout_secs = 1;
        let mut strikes = HashMap::new();

        run_llm_probe(&layout, &config, &mut strikes).await;
        assert!(!layout.ollama_fail_sentinel("build").exists());
        run_llm_probe(&layout, &config, &mut strikes).await;
        assert!(layout.ollama_fail_sentinel("build").exists());
    }
}
