//! Spawn Supervisor (component K): create a subagent role + terminal
//! window, seed its inbox, detect completion via pane presence.
//!
//! Grounded on `tmux_sender`/`codex_tmux`/`lifecycle` in the team-mail
//! worker adapter: shells out to `tmux` for window management the same
//! way `DefaultTmuxSender` shells out for pane delivery, and reuses its
//! rate-limited, retrying `send-keys` idiom for the initial launch
//! command instead of building a richer async sender trait (there is
//! exactly one send per spawn, not a steady stream).

use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::event_log::{emit_event_best_effort, EventFields};
use crate::io::entity_store;
use crate::io::error::BusError;
use crate::io::inbox;
use crate::layout::Layout;
use crate::schema::entities::{SpawnEntry, SpawnStatus};
use crate::schema::message::{Message, MessageType};
use uuid::Uuid;

const LAUNCHER_SEARCH_PATHS: &[&str] = &[
    "/usr/local/libexec/agent-bus/launch-agent",
    "/usr/libexec/agent-bus/launch-agent",
];
const LAUNCHER_BIN_NAME: &str = "launch-agent";

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn spawn_role_for(id: &str) -> String {
    let hex: String = id.chars().filter(|c| c.is_ascii_hexdigit()).collect();
    let tail = if hex.len() >= 8 {
        &hex[hex.len() - 8..]
    } else {
        &hex[..]
    };
    format!("spawn-{tail}")
}

/// Locates the agent launcher script: fixed search paths first, then `PATH`.
pub fn find_launcher() -> Result<String, BusError> {
    for candidate in LAUNCHER_SEARCH_PATHS {
        if std::path::Path::new(candidate).exists() {
            return Ok(candidate.to_string());
        }
    }
    if let Ok(path_var) = std::env::var("PATH") {
        for dir in std::env::split_paths(&path_var) {
            let candidate = dir.join(LAUNCHER_BIN_NAME);
            if candidate.exists() {
                return Ok(candidate.to_string_lossy().to_string());
            }
        }
    }
    Err(BusError::Invalid {
        message: format!("agent launcher '{LAUNCHER_BIN_NAME}' not found in search paths or PATH"),
    })
}

fn run_tmux(args: &[&str]) -> Result<(), BusError> {
    let output = Command::new("tmux")
        .args(args)
        .output()
        .map_err(|e| BusError::Invalid {
            message: format!("failed to invoke tmux {args:?}: {e}"),
        })?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(BusError::Invalid {
            message: format!("tmux {args:?} failed: {stderr}"),
        });
    }
    Ok(())
}

/// `StartSpawn(role, task, owner)`.
pub fn start(layout: &Layout, role: &str, task: &str, owner: &str) -> Result<SpawnEntry, BusError> {
    let id = Uuid::new_v4().to_string();
    let spawn_role = spawn_role_for(&id);

    let seed = Message::new(owner, &spawn_role, MessageType::Request, "spawn-task", task);
    inbox::send_no_cc(layout, &seed)?;

    let launcher = find_launcher()?;

    run_tmux(&["new-window", "-d", "-n", &spawn_role])?;
    run_tmux(&["split-window", "-t", &spawn_role])?;
    let pane = format!("{spawn_role}.1");
    let launch_cmd = format!("AGENT_ROLE={spawn_role} {launcher} {role}");
    run_tmux(&["send-keys", "-t", &pane, &launch_cmd, "Enter"])?;

    let entry = SpawnEntry {
        id: id.clone(),
        role: role.to_string(),
        spawn_role: spawn_role.clone(),
        owner: owner.to_string(),
        task: task.to_string(),
        status: SpawnStatus::Running,
        window: spawn_role.clone(),
        started_at: now_unix(),
        finished_at: 0,
        notified: false,
    };
    entity_store::mutate::<SpawnEntry, _>(&layout.spawn_jsonl(), |v| v.push(entry.clone()))?;

    // Fixed delay so the launcher has a chance to start reading before
    // we poke its pane; this is run from a synchronous caller.
    std::thread::sleep(std::time::Duration::from_millis(500));
    let _ = run_tmux(&["send-keys", "-t", &pane, "Enter"]);

    emit_event_best_effort(EventFields {
        level: "info",
        source: "spawn_supervisor",
        action: "start",
        role: Some(entry.spawn_role.clone()),
        target: Some(entry.role.clone()),
        result: Some("ok".to_string()),
        ..Default::default()
    });

    Ok(entry)
}

fn list_windows() -> Result<Vec<String>, BusError> {
    let output = Command::new("tmux")
        .args(["list-windows", "-F", "#{window_name}"])
        .output()
        .map_err(|e| BusError::Invalid {
            message: format!("failed to invoke tmux list-windows: {e}"),
        })?;
    if !output.status.success() {
        // No tmux server running at all reads as "no windows".
        return Ok(Vec::new());
    }
    Ok(String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|s| s.to_string())
        .collect())
}

/// Entries whose window has disappeared from the multiplexer become
/// `completed`. Returns the entries that just completed.
pub fn refresh(layout: &Layout) -> Result<Vec<SpawnEntry>, BusError> {
    let live_windows = list_windows()?;
    let mut completed = Vec::new();
    entity_store::mutate::<SpawnEntry, _>(&layout.spawn_jsonl(), |entries| {
        for e in entries.iter_mut() {
            if e.status != SpawnStatus::Running {
                continue;
            }
            if live_windows.iter().any(|w| w == &e.window) {
                continue;
            }
            e.status = SpawnStatus::Completed;
            e.finished_at = now_unix();
            completed.push(e.clone());
        }
    })?;
    Ok(completed)
}

/// The spawn's final output: the last message logged *from* `spawn_role`.
pub fn result(layout: &Layout, spawn_role: &str) -> Result<Option<Message>, BusError> {
    let contents = match std::fs::read_to_string(layout.log_jsonl()) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(BusError::io(layout.log_jsonl(), e)),
    };
    let last = contents
        .lines()
        .rev()
        .filter_map(|l| Message::from_line(l).ok())
        .find(|m| m.from == spawn_role);
    Ok(last)
}

pub fn stop(layout: &Layout, id: &str) -> Result<(), BusError> {
    let mut window = None;
    entity_store::mutate::<SpawnEntry, _>(&layout.spawn_jsonl(), |entries| {
        for e in entries.iter_mut() {
            if e.id == id && e.status == SpawnStatus::Running {
                window = Some(e.window.clone());
                e.status = SpawnStatus::Stopped;
                e.finished_at = now_unix();
            }
        }
    })?;
    if let Some(w) = window {
        let _ = run_tmux(&["kill-window", "-t", &w]);
        emit_event_best_effort(EventFields {
            level: "info",
            source: "spawn_supervisor",
            action: "stop",
            role: Some(id.to_string()),
            result: Some("ok".to_string()),
            ..Default::default()
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_role_for_derives_last_8_hex() {
        assert_eq!(
            spawn_role_for("1234abcd-5678-ef01-2345-6789abcdef01"),
            "spawn-abcdef01"
        );
    }

    #[test]
    fn spawn_role_for_short_id_uses_whole_string() {
        assert_eq!(spawn_role_for("abc"), "spawn-abc");
    }
}
