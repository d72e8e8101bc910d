//! Loop Guard (component G): command-loop and message-loop detectors over
//! history and the session log, with cooldown-deduped alerts.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::schema::message::{Message, MessageType};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub ts: i64,
    pub command: String,
    pub summary: String,
    pub exit_code: i32,
    pub outcome: String,
    pub output: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub key: String,
    pub kind: AlertKind,
    pub detail: String,
    pub count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    Command,
    Message,
}

fn env_assign_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*=\S+ )+").unwrap())
}

fn cd_prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^cd\s+\S+\s*&&\s*").unwrap())
}

fn bash_c_prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^bash -c\s+").unwrap())
}

fn redirect_suffix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*2>&1\s*$").unwrap())
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

/// Idempotent command normalization so equivalent invocations collapse to
/// the same loop-detector key regardless of shell wrapping.
pub fn normalize_command(cmd: &str) -> String {
    let mut s = cmd.trim().to_string();
    s = cd_prefix_re().replace(&s, "").into_owned();
    s = env_assign_re().replace(&s, "").into_owned();
    s = bash_c_prefix_re().replace(&s, "").into_owned();
    s = redirect_suffix_re().replace(&s, "").into_owned();
    s = whitespace_re().replace_all(s.trim(), " ").into_owned();
    s
}

/// Command-loop detector: the most recent entry must be a failure whose
/// normalized command matches the previous consecutive failures within
/// `window_secs`, at least `threshold` times.
pub fn detect_command_loop(
    entries: &[HistoryEntry],
    role: &str,
    threshold: u32,
    window_secs: i64,
) -> Option<Alert> {
    let last = entries.last()?;
    if last.outcome != "failure" {
        return None;
    }
    let normalized = normalize_command(&last.command);
    let last_ts = last.ts;

    let mut count = 0u32;
    for entry in entries.iter().rev() {
        if entry.outcome != "failure" {
            break;
        }
        if last_ts - entry.ts > window_secs {
            break;
        }
        if normalize_command(&entry.command) != normalized {
            break;
        }
        count += 1;
    }

    if count >= threshold {
        Some(Alert {
            key: format!("{role}:command:{normalized}"),
            kind: AlertKind::Command,
            detail: normalized,
            count,
        })
    } else {
        None
    }
}

/// Message-loop detector over the tail of the session log. Filters to
/// `type == request` and excludes watcher traffic. Looks for repeated
/// `(from, to, action)` tuples and for alternating A<->B ping-pong on the
/// same action.
///
/// Ping-pong counts only on direction *alternation*; a same-direction
/// repeat resets the run and is left to the tuple counter instead (see
/// DESIGN.md Open Question decision 3).
pub fn detect_message_loop(
    messages: &[Message],
    role: &str,
    threshold: u32,
    window_secs: i64,
) -> Option<Alert> {
    let relevant: Vec<&Message> = messages
        .iter()
        .filter(|m| m.msg_type == MessageType::Request)
        .filter(|m| m.from != "watcher")
        .filter(|m| m.from == role || m.to == role)
        .collect();

    if relevant.is_empty() {
        return None;
    }

    let window_end = relevant.last().unwrap().ts;

    // Tuple counter: (from, to, action).
    let mut tuple_counts: HashMap<(String, String, String), u32> = HashMap::new();
    for m in &relevant {
        if window_end - m.ts > window_secs {
            continue;
        }
        *tuple_counts
            .entry((m.from.clone(), m.to.clone(), m.action.clone()))
            .or_insert(0) += 1;
    }
    if let Some(((from, to, action), count)) = tuple_counts
        .into_iter()
        .filter(|(_, c)| *c >= threshold)
        .max_by_key(|(_, c)| *c)
    {
        let peer = if from == role { to } else { from };
        return Some(Alert {
            key: format!("{role}:message:{peer}:{action}"),
            kind: AlertKind::Message,
            detail: format!("{peer}:{action}"),
            count,
        });
    }

    // Ping-pong: alternating direction, same action.
    let windowed: Vec<&&Message> = relevant
        .iter()
        .filter(|m| window_end - m.ts <= window_secs)
        .collect();

    let mut best: Option<(String, String, u32)> = None;
    let mut i = 0;
    while i < windowed.len() {
        let start_action = windowed[i].action.clone();
        let mut run = 1u32;
        let mut last_from = windowed[i].from.clone();
        let mut last_to = windowed[i].to.clone();
        let mut j = i + 1;
        while j < windowed.len() && windowed[j].action == start_action {
            let same_direction = windowed[j].from == last_from && windowed[j].to == last_to;
            if same_direction {
                break;
            }
            run += 1;
            last_from = windowed[j].from.clone();
            last_to = windowed[j].to.clone();
            j += 1;
        }
        if run >= threshold {
            let peer = if windowed[i].from == role {
                windowed[i].to.clone()
            } else {
                windowed[i].from.clone()
            };
            let candidate = (peer, start_action.clone(), run);
            best = match best {
                Some((_, _, best_run)) if best_run >= run => best,
                _ => Some(candidate),
            };
        }
        i += 1;
    }

    best.map(|(peer, action, count)| Alert {
        key: format!("{role}:message:{peer}:{action}"),
        kind: AlertKind::Message,
        detail: format!("{peer}:{action}"),
        count,
    })
}

/// In-memory 300s-default cooldown map, keyed by alert key.
pub struct CooldownMap {
    last_fired: HashMap<String, i64>,
    cooldown_secs: i64,
}

impl CooldownMap {
    pub fn new(cooldown_secs: i64) -> Self {
        CooldownMap {
            last_fired: HashMap::new(),
            cooldown_secs,
        }
    }

    /// Returns `true` if the alert should be emitted (and records `now` as
    /// the last-fired time), `false` if it is within cooldown.
    pub fn should_emit(&mut self, key: &str, now: i64) -> bool {
        match self.last_fired.get(key) {
            Some(&last) if now - last < self.cooldown_secs => false,
            _ => {
                self.last_fired.insert(key.to_string(), now);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(ts: i64, command: &str, outcome: &str) -> HistoryEntry {
        HistoryEntry {
            ts,
            command: command.to_string(),
            summary: String::new(),
            exit_code: if outcome == "success" { 0 } else { 1 },
            outcome: outcome.to_string(),
            output: String::new(),
        }
    }

    #[test]
    fn normalize_is_idempotent() {
        let cmd = "FOO=bar cd /tmp && bash -c go build ./... 2>&1";
        let once = normalize_command(cmd);
        let twice = normalize_command(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn normalize_strips_prefixes_and_suffix() {
        let normalized = normalize_command("cd /tmp && FOO=bar go build ./... 2>&1");
        assert_eq!(normalized, "go build ./...");
    }

    #[test]
    fn command_loop_nil_when_last_is_success() {
        let entries = vec![
            history(0, "go build ./...", "failure"),
            history(60, "go build ./...", "failure"),
            history(120, "go build ./...", "success"),
        ];
        assert!(detect_command_loop(&entries, "build", 3, 300).is_none());
    }

    #[test]
    fn command_loop_fires_at_threshold() {
        let entries = vec![
            history(0, "go build ./...", "failure"),
            history(60, "go build ./...", "failure"),
            history(120, "go build ./...", "failure"),
        ];
        let alert = detect_command_loop(&entries, "build", 3, 300).unwrap();
        assert_eq!(alert.count, 3);
        assert_eq!(alert.detail, "go build ./...");
        assert_eq!(alert.key, "build:command:go build ./...");
    }

    #[test]
    fn command_loop_respects_window() {
        let entries = vec![
            history(0, "go build ./...", "failure"),
            history(500, "go build ./...", "failure"),
            history(560, "go build ./...", "failure"),
        ];
        // first entry is outside the 300s window from the last entry
        let alert = detect_command_loop(&entries, "build", 3, 300);
        assert!(alert.is_none() || alert.unwrap().count < 3);
    }

    fn msg(from: &str, to: &str, action: &str, ts: i64) -> Message {
        Message::new(from, to, MessageType::Request, action, "x").with_ts(ts)
    }

    #[test]
    fn message_loop_ignores_non_request_and_watcher() {
        let messages = vec![
            Message::new("watcher", "build", MessageType::Request, "poke", "x").with_ts(0),
            Message::new("build", "test", MessageType::Event, "test", "x").with_ts(1),
        ];
        assert!(detect_message_loop(&messages, "build", 4, 300).is_none());
    }

    #[test]
    fn message_loop_detects_ping_pong() {
        let messages = vec![
            msg("build", "test", "test", 0),
            msg("test", "build", "test", 10),
            msg("build", "test", "test", 20),
            msg("test", "build", "test", 30),
        ];
        let alert = detect_message_loop(&messages, "build", 4, 300).unwrap();
        assert!(alert.count >= 4);
        assert_eq!(alert.detail, "test:test");
    }

    #[test]
    fn same_direction_repeats_do_not_count_as_ping_pong() {
        let messages = vec![
            msg("build", "test", "test", 0),
            msg("build", "test", "test", 10),
            msg("build", "test", "test", 20),
        ];
        // Same-direction repeats should be caught by the tuple detector,
        // not counted toward the ping-pong alternation run.
        let alert = detect_message_loop(&messages, "build", 3, 300).unwrap();
        assert_eq!(alert.detail, "test:test");
        assert_eq!(alert.count, 3);
    }

    #[test]
    fn cooldown_suppresses_repeat_alerts() {
        let mut cooldown = CooldownMap::new(300);
        assert!(cooldown.should_emit("role:command:x", 0));
        assert!(!cooldown.should_emit("role:command:x", 100));
        assert!(cooldown.should_emit("role:command:x", 301));
    }
}
