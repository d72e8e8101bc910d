//! Exclusive file locking with exponential backoff, used by
//! [`crate::io::entity_store`] to serialize whole-file JSONL entity
//! rewrites. Adapted verbatim from the team-mail inbox lock helper;
//! distinct from [`crate::io::lock_signal`], which is a *presence-only*
//! advisory flag visible to peers, not a mutex.

use std::fs::File;
use std::path::Path;
use std::time::Duration;

use fs2::FileExt;

use crate::io::error::BusError;

pub struct EntityLock {
    file: File,
}

impl Drop for EntityLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Acquires an exclusive lock on `path`, creating it if absent. Retries
/// with backoff 50ms, 100ms, 200ms, 400ms, 800ms, ... up to `max_retries`.
pub fn acquire_lock(path: &Path, max_retries: u32) -> Result<EntityLock, BusError> {
    use std::fs::OpenOptions;

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| BusError::io(path, e))?;

    for attempt in 0..=max_retries {
        match file.try_lock_exclusive() {
            Ok(()) => return Ok(EntityLock { file }),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                if attempt < max_retries {
                    let wait_ms = 50u64 * (1 << attempt);
                    std::thread::sleep(Duration::from_millis(wait_ms));
                }
            }
            Err(e) => return Err(BusError::io(path, e)),
        }
    }

    Err(BusError::LockTimeout {
        path: path.to_path_buf(),
        retries: max_retries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn acquire_and_release() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("entity.lock");
        let lock = acquire_lock(&path, 5).unwrap();
        assert!(path.exists());
        drop(lock);
        let _lock2 = acquire_lock(&path, 5).unwrap();
    }

    #[test]
    fn sequential_acquires_succeed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("entity.lock");
        {
            let _l = acquire_lock(&path, 5).unwrap();
        }
        let _l2 = acquire_lock(&path, 5).unwrap();
    }

    #[test]
    fn timeout_when_already_held() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("entity.lock");
        let _holder = acquire_lock(&path, 5).unwrap();
        let result = acquire_lock(&path, 1);
        assert!(matches!(result, Err(BusError::LockTimeout { .. })));
    }
}
