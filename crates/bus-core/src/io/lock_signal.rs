//! Lock Signal (component D): presence-only advisory "busy" flag. Carries
//! no payload and no owner; any process may unlock. Does not gate the
//! inbox engine. Distinct from [`crate::io::entity_lock`], which is a real
//! mutex protecting whole-file JSONL rewrites.

use std::fs;

use crate::io::error::BusError;
use crate::layout::Layout;

pub fn lock(layout: &Layout, role: &str) -> Result<(), BusError> {
    let path = layout.lock(role);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| BusError::io(parent, e))?;
    }
    fs::File::create(&path).map_err(|e| BusError::io(&path, e))?;
    Ok(())
}

pub fn unlock(layout: &Layout, role: &str) -> Result<(), BusError> {
    let path = layout.lock(role);
    match fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(BusError::io(&path, e)),
    }
}

pub fn is_locked(layout: &Layout, role: &str) -> bool {
    layout.lock(role).exists()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn lock_unlock_cycle() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::from_root(dir.path());
        assert!(!is_locked(&layout, "build"));
        lock(&layout, "build").unwrap();
        assert!(is_locked(&layout, "build"));
        unlock(&layout, "build").unwrap();
        assert!(!is_locked(&layout, "build"));
    }

    #[test]
    fn unlock_on_absent_lock_is_ok() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::from_root(dir.path());
        assert!(unlock(&layout, "build").is_ok());
    }
}
