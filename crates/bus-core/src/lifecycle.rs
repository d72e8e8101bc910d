//! Session Lifecycle (component P): `Init`, re-init purge, and `Cleanup`.

use std::fs;

use crate::io::error::BusError;
use crate::layout::{Layout, KNOWN_ROLES};
use crate::schema::entities::SessionMeta;

/// Creates the directory tree and touches every per-role inbox file so
/// stat-based presence checks work. On an existing tree this is a re-init:
/// ephemeral files are truncated or removed; memory, history files (kept,
/// truncated), and shared config survive.
pub fn init(layout: &Layout) -> Result<(), BusError> {
    for dir in layout.all_dirs() {
        fs::create_dir_all(&dir).map_err(|e| BusError::io(&dir, e))?;
    }

    for role in KNOWN_ROLES {
        truncate_or_create(&layout.inbox(role))?;
        truncate_or_create(&layout.role_history_jsonl(role))?;
    }

    if layout.inbox_dir().exists() {
        for entry in fs::read_dir(layout.inbox_dir()).map_err(|e| BusError::io(layout.inbox_dir(), e))? {
            let entry = entry.map_err(|e| BusError::io(layout.inbox_dir(), e))?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            let role_part = name.strip_suffix(".consuming").unwrap_or(&name);
            if !KNOWN_ROLES.contains(&role_part) {
                let _ = fs::remove_file(entry.path());
            }
        }
    }

    truncate_or_create(&layout.log_jsonl())?;
    remove_if_exists(&layout.cron_jsonl())?;
    remove_if_exists(&layout.cron_history_jsonl())?;
    remove_if_exists(&layout.proc_jsonl())?;
    remove_if_exists(&layout.spawn_jsonl())?;
    remove_if_exists(&layout.subscriptions_jsonl())?;
    remove_if_exists(&layout.webhook_pid())?;
    remove_if_exists(&layout.trigger_file())?;

    if layout.lock_dir().exists() {
        for entry in fs::read_dir(layout.lock_dir()).map_err(|e| BusError::io(layout.lock_dir(), e))? {
            let entry = entry.map_err(|e| BusError::io(layout.lock_dir(), e))?;
            let _ = fs::remove_file(entry.path());
        }
    }

    if layout.root().exists() {
        for entry in fs::read_dir(layout.root()).map_err(|e| BusError::io(layout.root(), e))? {
            let entry = entry.map_err(|e| BusError::io(layout.root(), e))?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with("harness-") || name.starts_with("notified-") {
                let _ = fs::remove_file(entry.path());
            }
        }
    }

    for role in KNOWN_ROLES {
        let meta_path = layout.session_meta(role);
        if !meta_path.exists() {
            if let Some(parent) = meta_path.parent() {
                fs::create_dir_all(parent).map_err(|e| BusError::io(parent, e))?;
            }
            let meta = SessionMeta::default();
            let json = serde_json::to_string(&meta).map_err(|e| BusError::json(&meta_path, e))?;
            fs::write(&meta_path, json).map_err(|e| BusError::io(&meta_path, e))?;
        }
    }

    Ok(())
}

/// Removes the whole bus tree and the trigger file.
pub fn cleanup(layout: &Layout) -> Result<(), BusError> {
    if layout.root().exists() {
        fs::remove_dir_all(layout.root()).map_err(|e| BusError::io(layout.root(), e))?;
    }
    Ok(())
}

fn truncate_or_create(path: &std::path::Path) -> Result<(), BusError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| BusError::io(parent, e))?;
    }
    fs::File::create(path).map_err(|e| BusError::io(path, e))?;
    Ok(())
}

fn remove_if_exists(path: &std::path::Path) -> Result<(), BusError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(BusError::io(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{inbox, lock_signal};
    use crate::schema::message::{Message, MessageType};
    use tempfile::TempDir;

    #[test]
    fn init_creates_dirs_and_inbox_files() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::from_root(dir.path());
        init(&layout).unwrap();
        assert!(layout.inbox_dir().is_dir());
        assert!(layout.inbox("build").exists());
        assert!(layout.lock_dir().is_dir());
    }

    #[test]
    fn reinit_clears_log_and_locks_but_keeps_history_path() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::from_root(dir.path());
        init(&layout).unwrap();

        let msg = Message::new("edit", "build", MessageType::Request, "compile", "x");
        inbox::send_no_cc(&layout, &msg).unwrap();
        lock_signal::lock(&layout, "build").unwrap();
        std::fs::write(layout.role_history_jsonl("build"), "{}\n").unwrap();

        init(&layout).unwrap();

        assert_eq!(std::fs::metadata(layout.log_jsonl()).unwrap().len(), 0);
        assert!(!lock_signal::is_locked(&layout, "build"));
        assert!(layout.role_history_jsonl("build").exists());
        assert_eq!(
            std::fs::metadata(layout.role_history_jsonl("build"))
                .unwrap()
                .len(),
            0
        );
    }

    #[test]
    fn reinit_purges_orphan_spawn_inboxes() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::from_root(dir.path());
        init(&layout).unwrap();

        std::fs::write(layout.inbox("spawn-deadbeef"), "").unwrap();
        std::fs::write(layout.inbox_consuming("spawn-deadbeef"), "").unwrap();

        init(&layout).unwrap();

        assert!(!layout.inbox("spawn-deadbeef").exists());
        assert!(!layout.inbox_consuming("spawn-deadbeef").exists());
        assert!(layout.inbox("build").exists());
    }

    #[test]
    fn cleanup_removes_whole_tree() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::from_root(dir.path());
        init(&layout).unwrap();
        cleanup(&layout).unwrap();
        assert!(!layout.root().exists());
    }
}
