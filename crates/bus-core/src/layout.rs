//! Identifiers & Layout (component A): on-disk paths for a session, the
//! role registry, and role-name validation. All paths are derived from the
//! session root, never configured piecemeal.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::io::error::BusError;

/// Roles known at compile time.
pub const KNOWN_ROLES: &[&str] = &[
    "edit", "build", "test", "review", "deploy", "runner", "commit", "analyst", "docs",
    "research", "watch", "webhook",
];

fn spawn_role_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^spawn-[0-9a-f]+$").expect("static regex is valid"))
}

/// True for a fixed-registry role or a dynamically spawned `spawn-<hex>` role.
pub fn is_known_role(role: &str) -> bool {
    KNOWN_ROLES.contains(&role) || spawn_role_re().is_match(role)
}

/// Rejects unknown role names at the API boundary.
pub fn validate_role(role: &str) -> Result<(), BusError> {
    if is_known_role(role) {
        Ok(())
    } else {
        Err(BusError::UnknownRole {
            role: role.to_string(),
        })
    }
}

/// Resolves every on-disk path for one session. Cheap to construct and
/// clone; holds only the session root.
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    /// Resolves the session root: `BUS_HOME` env var if set, else
    /// `<user-cache-dir>/agent-bus/sessions/<session>`.
    pub fn new(session: &str) -> Self {
        let root = match std::env::var_os("BUS_HOME") {
            Some(dir) => PathBuf::from(dir).join(session),
            None => dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("agent-bus")
                .join("sessions")
                .join(session),
        };
        Layout { root }
    }

    pub fn from_root(root: impl Into<PathBuf>) -> Self {
        Layout { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn inbox_dir(&self) -> PathBuf {
        self.root.join("inbox")
    }

    pub fn inbox(&self, role: &str) -> PathBuf {
        self.inbox_dir().join(role)
    }

    pub fn inbox_consuming(&self, role: &str) -> PathBuf {
        self.inbox_dir().join(format!("{role}.consuming"))
    }

    pub fn lock_dir(&self) -> PathBuf {
        self.root.join("lock")
    }

    pub fn lock(&self, role: &str) -> PathBuf {
        self.lock_dir().join(role)
    }

    pub fn ollama_fail_sentinel(&self, role: &str) -> PathBuf {
        self.lock_dir().join(format!("{role}.ollama-fail"))
    }

    pub fn session_dir(&self) -> PathBuf {
        self.root.join("session")
    }

    pub fn session_meta(&self, role: &str) -> PathBuf {
        self.session_dir().join(format!("{role}.json"))
    }

    pub fn proc_dir(&self) -> PathBuf {
        self.root.join("proc")
    }

    pub fn proc_log(&self, id: &str) -> PathBuf {
        self.proc_dir().join(format!("{id}.log"))
    }

    pub fn proc_jsonl(&self) -> PathBuf {
        self.root.join("proc.jsonl")
    }

    pub fn spawn_jsonl(&self) -> PathBuf {
        self.root.join("spawn.jsonl")
    }

    pub fn cron_jsonl(&self) -> PathBuf {
        self.root.join("cron.jsonl")
    }

    pub fn cron_history_jsonl(&self) -> PathBuf {
        self.root.join("cron-history.jsonl")
    }

    pub fn subscriptions_jsonl(&self) -> PathBuf {
        self.root.join("subscriptions.jsonl")
    }

    pub fn log_jsonl(&self) -> PathBuf {
        self.root.join("log.jsonl")
    }

    pub fn webhook_pid(&self) -> PathBuf {
        self.root.join("webhook.pid")
    }

    pub fn role_history_jsonl(&self, role: &str) -> PathBuf {
        self.root.join(format!("{role}-history.jsonl"))
    }

    pub fn notified_size_marker(&self, role: &str) -> PathBuf {
        self.root.join(format!("notified-{role}.size"))
    }

    pub fn harness_pid(&self, role: &str) -> PathBuf {
        self.root.join(format!("harness-{role}.pid"))
    }

    pub fn trigger_file(&self) -> PathBuf {
        self.root.join("trigger")
    }

    /// All directories that must exist for a freshly initialized session.
    pub fn all_dirs(&self) -> [PathBuf; 4] {
        [
            self.inbox_dir(),
            self.lock_dir(),
            self.session_dir(),
            self.proc_dir(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_roles_are_accepted() {
        for r in KNOWN_ROLES {
            assert!(is_known_role(r));
        }
    }

    #[test]
    fn spawn_roles_are_accepted() {
        assert!(is_known_role("spawn-deadbeef"));
        assert!(is_known_role("spawn-1"));
        assert!(!is_known_role("spawn-"));
        assert!(!is_known_role("spawn-XYZ"));
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert!(!is_known_role("nonsense"));
        assert!(validate_role("nonsense").is_err());
    }

    #[test]
    fn layout_paths_are_derived_consistently() {
        let layout = Layout::from_root("/tmp/example-session");
        assert_eq!(
            layout.inbox("build"),
            PathBuf::from("/tmp/example-session/inbox/build")
        );
        assert_eq!(
            layout.lock("build"),
            PathBuf::from("/tmp/example-session/lock/build")
        );
        assert_eq!(
            layout.ollama_fail_sentinel("build"),
            PathBuf::from("/tmp/example-session/lock/build.ollama-fail")
        );
    }
}
