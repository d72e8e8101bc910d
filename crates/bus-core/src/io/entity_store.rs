//! Whole-file JSONL entity store (component backing for `cron.jsonl`,
//! `proc.jsonl`, `spawn.jsonl`, `subscriptions.jsonl`). Each entity type is
//! a flat JSONL file; a mutator locks, reads every entry, applies a
//! closure, and writes the whole file back. Readers only need mutual
//! exclusion, not conflict resolution, so this is simpler than the
//! team-mail inbox's BLAKE3-conflict-detecting writer it is grounded on,
//! while reusing the same lock-then-read-then-write shape.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::io::entity_lock::acquire_lock;
use crate::io::error::BusError;

const LOCK_RETRIES: u32 = 5;

fn lock_path_for(entity_path: &Path) -> PathBuf {
    entity_path.with_extension("lock")
}

/// Reads every well-formed line of `path` as `T`, skipping malformed lines.
/// Missing file reads as empty.
pub fn read_all<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, BusError> {
    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(BusError::io(path, e)),
    };
    Ok(contents
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|l| serde_json::from_str::<T>(l).ok())
        .collect())
}

/// Locks, reads, lets `mutate` transform the collection in place, then
/// rewrites the whole file atomically (write-to-temp + rename).
pub fn mutate<T, F>(path: &Path, mutate: F) -> Result<(), BusError>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce(&mut Vec<T>),
{
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| BusError::io(parent, e))?;
    }
    let lock_path = lock_path_for(path);
    let _guard = acquire_lock(&lock_path, LOCK_RETRIES)?;

    let mut entries: Vec<T> = read_all(path)?;
    mutate(&mut entries);

    let mut buf = String::new();
    for entry in &entries {
        let line = serde_json::to_string(entry).map_err(|e| BusError::json(path, e))?;
        buf.push_str(&line);
        buf.push('\n');
    }

    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, buf).map_err(|e| BusError::io(&tmp_path, e))?;
    fs::rename(&tmp_path, path).map_err(|e| BusError::io(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Thing {
        id: String,
        n: u32,
    }

    #[test]
    fn mutate_on_missing_file_creates_it() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("things.jsonl");
        mutate::<Thing, _>(&path, |v| {
            v.push(Thing {
                id: "a".into(),
                n: 1,
            })
        })
        .unwrap();
        let all: Vec<Thing> = read_all(&path).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].n, 1);
    }

    #[test]
    fn mutate_appends_and_updates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("things.jsonl");
        mutate::<Thing, _>(&path, |v| {
            v.push(Thing {
                id: "a".into(),
                n: 1,
            })
        })
        .unwrap();
        mutate::<Thing, _>(&path, |v| {
            for t in v.iter_mut() {
                if t.id == "a" {
                    t.n = 2;
                }
            }
            v.push(Thing {
                id: "b".into(),
                n: 9,
            });
        })
        .unwrap();
        let all: Vec<Thing> = read_all(&path).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].n, 2);
        assert_eq!(all[1].id, "b");
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("things.jsonl");
        fs::write(&path, "{\"id\":\"a\",\"n\":1}\nnot json\n{\"id\":\"b\",\"n\":2}\n").unwrap();
        let all: Vec<Thing> = read_all(&path).unwrap();
        assert_eq!(all.len(), 2);
    }
}
