//! Inspector (component O): per-role status computed by intersecting lock
//! presence with a tail scan of the session log, plus markdown context
//! extraction for prompt injection.

use std::fs;

use serde::{Deserialize, Serialize};

use crate::io::{inbox, lock_signal};
use crate::layout::Layout;
use crate::schema::message::Message;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleStatus {
    pub role: String,
    pub locked: bool,
    pub inbox_count: usize,
    pub last_msg_ts: Option<i64>,
    pub last_action: Option<String>,
    pub last_peer: Option<String>,
    pub last_dir: Option<String>,
}

fn read_log(layout: &Layout) -> Vec<Message> {
    let path = layout.log_jsonl();
    match fs::read_to_string(&path) {
        Ok(contents) => contents
            .lines()
            .filter(|l| !l.trim().is_empty())
            .filter_map(|l| Message::from_line(l).ok())
            .collect(),
        Err(_) => Vec::new(),
    }
}

/// Computes a status snapshot for `role`.
pub fn status(layout: &Layout, role: &str) -> RoleStatus {
    let log = read_log(layout);
    let last = log
        .iter()
        .rev()
        .find(|m| m.from == role || m.to == role);

    let (last_msg_ts, last_action, last_peer, last_dir) = match last {
        Some(m) if m.from == role => (
            Some(m.ts),
            Some(m.action.clone()),
            Some(m.to.clone()),
            Some("out".to_string()),
        ),
        Some(m) => (
            Some(m.ts),
            Some(m.action.clone()),
            Some(m.from.clone()),
            Some("in".to_string()),
        ),
        None => (None, None, None, None),
    };

    RoleStatus {
        role: role.to_string(),
        locked: lock_signal::is_locked(layout, role),
        inbox_count: inbox::inbox_count(layout, role),
        last_msg_ts,
        last_action,
        last_peer,
        last_dir,
    }
}

/// Status for every role in `roles`.
pub fn status_all(layout: &Layout, roles: &[&str]) -> Vec<RoleStatus> {
    roles.iter().map(|r| status(layout, r)).collect()
}

/// Produces a markdown block summarizing the last `limit` log entries
/// involving `role`, for prompt injection by an external caller.
pub fn extract_context(layout: &Layout, role: &str, limit: usize) -> String {
    let log = read_log(layout);
    let relevant: Vec<&Message> = log
        .iter()
        .filter(|m| m.from == role || m.to == role)
        .rev()
        .take(limit)
        .collect();

    let mut out = format!("## Recent activity for `{role}`\n\n");
    if relevant.is_empty() {
        out.push_str("_no recent activity_\n");
        return out;
    }
    for m in relevant.iter().rev() {
        out.push_str(&format!(
            "- `{}` {} -> {} [{}] {}\n",
            m.ts, m.from, m.to, m.action, m.payload
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::inbox;
    use crate::schema::message::MessageType;
    use tempfile::TempDir;

    #[test]
    fn status_reflects_lock_and_inbox() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::from_root(dir.path());
        lock_signal::lock(&layout, "build").unwrap();
        let msg = Message::new("edit", "build", MessageType::Request, "compile", "x");
        inbox::send_no_cc(&layout, &msg).unwrap();

        let status = status(&layout, "build");
        assert!(status.locked);
        assert_eq!(status.inbox_count, 1);
        assert_eq!(status.last_action.as_deref(), Some("compile"));
        assert_eq!(status.last_peer.as_deref(), Some("edit"));
        assert_eq!(status.last_dir.as_deref(), Some("in"));
    }

    #[test]
    fn extract_context_is_empty_for_no_history() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::from_root(dir.path());
        let ctx = extract_context(&layout, "build", 10);
        assert!(ctx.contains("no recent activity"));
    }
}
