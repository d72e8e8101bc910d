//! Process Supervisor (component J): launch detached background commands,
//! track PID + exit-code sentinel, reap, stop.

use std::fs;
use std::process::{Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::io::entity_store;
use crate::io::error::BusError;
use crate::layout::Layout;
use crate::schema::entities::{ProcEntry, ProcStatus};
use uuid::Uuid;

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// `StartProc(command, dir, owner)`: wraps the command so the exit-code
/// sentinel is written even on `exit N`, launches it detached in its own
/// process group, and records a `running` entry.
pub fn start(layout: &Layout, command: &str, dir: &str, owner: &str) -> Result<ProcEntry, BusError> {
    let id = Uuid::new_v4().to_string();
    let log_path = layout.proc_log(&id);
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent).map_err(|e| BusError::io(parent, e))?;
    }

    let wrapped = format!(
        "( {command} ); echo EXIT_CODE:$? >> {}",
        log_path.display()
    );

    let log_file = fs::File::create(&log_path).map_err(|e| BusError::io(&log_path, e))?;
    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(&wrapped)
        .current_dir(dir)
        .stdout(Stdio::from(log_file.try_clone().map_err(|e| BusError::io(&log_path, e))?))
        .stderr(Stdio::from(log_file));

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        unsafe {
            cmd.pre_exec(|| {
                libc::setsid();
                Ok(())
            });
        }
    }

    let child = cmd.spawn().map_err(|e| BusError::io(dir, e))?;
    let pid = child.id() as i32;

    let entry = ProcEntry {
        id: id.clone(),
        pid,
        command: command.to_string(),
        dir: dir.to_string(),
        owner: owner.to_string(),
        status: ProcStatus::Running,
        exit_code: -1,
        started_at: now_unix(),
        finished_at: 0,
        log_file: log_path.to_string_lossy().to_string(),
        notified: false,
    };

    entity_store::mutate::<ProcEntry, _>(&layout.proc_jsonl(), |v| v.push(entry.clone()))?;
    Ok(entry)
}

#[cfg(unix)]
fn is_alive(pid: i32) -> bool {
    unsafe { libc::kill(pid, 0) == 0 }
}

#[cfg(not(unix))]
fn is_alive(_pid: i32) -> bool {
    true
}

fn tail_exit_code(log_path: &str) -> Option<i32> {
    let contents = fs::read_to_string(log_path).ok()?;
    contents
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .and_then(|l| l.trim().strip_prefix("EXIT_CODE:"))
        .and_then(|n| n.trim().parse().ok())
}

/// Iterates running entries; dead ones transition to `exited`/`failed`
/// based on the tail of their log. Returns entries that just completed.
pub fn refresh(layout: &Layout) -> Result<Vec<ProcEntry>, BusError> {
    let mut completed = Vec::new();
    entity_store::mutate::<ProcEntry, _>(&layout.proc_jsonl(), |entries| {
        for e in entries.iter_mut() {
            if e.status != ProcStatus::Running {
                continue;
            }
            if is_alive(e.pid) {
                continue;
            }
            let exit_code = tail_exit_code(&e.log_file).unwrap_or(-1);
            e.exit_code = exit_code;
            e.status = if exit_code == 0 {
                ProcStatus::Exited
            } else {
                ProcStatus::Failed
            };
            e.finished_at = now_unix();
            completed.push(e.clone());
        }
    })?;
    Ok(completed)
}

/// Sends `SIGTERM` to the process group first, then falls back to the
/// single PID; marks `stopped`.
pub fn stop(layout: &Layout, id: &str) -> Result<(), BusError> {
    let mut target_pid = None;
    entity_store::mutate::<ProcEntry, _>(&layout.proc_jsonl(), |entries| {
        for e in entries.iter_mut() {
            if e.id == id && e.status == ProcStatus::Running {
                target_pid = Some(e.pid);
                e.status = ProcStatus::Stopped;
                e.finished_at = now_unix();
            }
        }
    })?;

    if let Some(pid) = target_pid {
        #[cfg(unix)]
        unsafe {
            libc::kill(-pid, libc::SIGTERM);
            libc::kill(pid, libc::SIGTERM);
        }
        #[cfg(not(unix))]
        let _ = pid;
    }
    Ok(())
}

/// Removes non-running entries and their log files.
pub fn clean_finished(layout: &Layout) -> Result<usize, BusError> {
    let mut removed = 0usize;
    entity_store::mutate::<ProcEntry, _>(&layout.proc_jsonl(), |entries| {
        let (keep, drop): (Vec<_>, Vec<_>) = entries
            .drain(..)
            .partition(|e| e.status == ProcStatus::Running);
        for e in &drop {
            let _ = fs::remove_file(&e.log_file);
        }
        removed = drop.len();
        *entries = keep;
    })?;
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn start_then_refresh_marks_exited_on_zero() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::from_root(dir.path());
        start(&layout, "echo hi", dir.path().to_str().unwrap(), "build").unwrap();
        sleep(Duration::from_millis(300));
        let completed = refresh(&layout).unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].status, ProcStatus::Exited);
        assert_eq!(completed[0].exit_code, 0);
    }

    #[test]
    fn start_then_refresh_marks_failed_on_nonzero() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::from_root(dir.path());
        start(&layout, "exit 42", dir.path().to_str().unwrap(), "build").unwrap();
        sleep(Duration::from_millis(300));
        let completed = refresh(&layout).unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].status, ProcStatus::Failed);
        assert_eq!(completed[0].exit_code, 42);
    }

    #[test]
    fn clean_finished_removes_completed_entries() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::from_root(dir.path());
        start(&layout, "echo hi", dir.path().to_str().unwrap(), "build").unwrap();
        sleep(Duration::from_millis(300));
        refresh(&layout).unwrap();
        let removed = clean_finished(&layout).unwrap();
        assert_eq!(removed, 1);
        let remaining: Vec<ProcEntry> = entity_store::read_all(&layout.proc_jsonl()).unwrap();
        assert!(remaining.is_empty());
    }
}
