//! Inbox Engine (component C): append-to-inbox-and-log, drain-atomic
//! receive, non-consuming peek, and stat-based presence helpers.
//!
//! Grounded on the *shape* of the team-mail inbox module (append/receive
//! helpers, a `WriteOutcome`-like result), but not its algorithm: that
//! module protects a whole-JSON-array file with a BLAKE3 conflict check and
//! a platform atomic-swap, because its entities are mutable arrays. Here
//! the underlying files are append-only JSONL, so sends are a single
//! `O_APPEND` write and receives are a rename-to-`.consuming`
//! drain — the rename is the linearization point.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;

use crate::io::error::BusError;
use crate::layout::Layout;
use crate::schema::message::Message;

/// Default auto-CC set.
pub const DEFAULT_AUTO_CC: &[&str] = &["build", "test", "review"];

fn append_line(path: &Path, line: &str) -> Result<(), BusError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| BusError::io(parent, e))?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| BusError::io(path, e))?;
    file.write_all(line.as_bytes())
        .map_err(|e| BusError::io(path, e))?;
    Ok(())
}

/// `Send(session, message, autoCC)`. Appends to `inbox/<to>` then to
/// `log.jsonl`; if `autoCC` and `from` is in `auto_cc_set` and `to != edit`,
/// also appends to `inbox/edit`. Auto-CC failures are logged, not
/// propagated; a log-append failure fails the send.
pub fn send(
    layout: &Layout,
    message: &Message,
    auto_cc: bool,
    auto_cc_set: &[&str],
) -> Result<(), BusError> {
    let line = message
        .to_line()
        .map_err(|e| BusError::json(layout.inbox(&message.to), e))?;

    append_line(&layout.inbox(&message.to), &line)?;
    append_line(&layout.log_jsonl(), &line)?;

    if auto_cc && message.to != "edit" && auto_cc_set.contains(&message.from.as_str()) {
        if let Err(e) = append_line(&layout.inbox("edit"), &line) {
            tracing::warn!(error = %e, "auto-CC append to edit failed, primary send still succeeded");
        }
    }
    Ok(())
}

/// `SendNoCC`: skips the fan-out step. Used by chain outputs, analyst
/// notifications, and subscription re-broadcasts to avoid double-delivery.
pub fn send_no_cc(layout: &Layout, message: &Message) -> Result<(), BusError> {
    let line = message
        .to_line()
        .map_err(|e| BusError::json(layout.inbox(&message.to), e))?;
    append_line(&layout.inbox(&message.to), &line)?;
    append_line(&layout.log_jsonl(), &line)?;
    Ok(())
}

fn parse_messages(contents: &str) -> Vec<Message> {
    contents
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|l| Message::from_line(l).ok())
        .collect()
}

/// `Receive(session, role)`: drain-atomic. Renames `inbox/<role>` to
/// `inbox/<role>.consuming`; a rename failure because the source does not
/// exist means the inbox is already empty (returns `Ok(vec![])`). Creates
/// a fresh empty inbox, parses the consuming file, then removes it.
pub fn receive(layout: &Layout, role: &str) -> Result<Vec<Message>, BusError> {
    let inbox_path = layout.inbox(role);
    let consuming_path = layout.inbox_consuming(role);

    match fs::rename(&inbox_path, &consuming_path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(BusError::io(&inbox_path, e)),
    }

    // Recreate the inbox immediately so senders racing the rename never
    // block; any append that lands after this point starts a fresh file.
    if let Some(parent) = inbox_path.parent() {
        fs::create_dir_all(parent).map_err(|e| BusError::io(parent, e))?;
    }
    File::create(&inbox_path).map_err(|e| BusError::io(&inbox_path, e))?;

    let contents = fs::read_to_string(&consuming_path).map_err(|e| BusError::io(&consuming_path, e))?;
    let messages = parse_messages(&contents);

    let _ = fs::remove_file(&consuming_path);
    Ok(messages)
}

/// `Peek(session, role)`: snapshot read, no rename.
pub fn peek(layout: &Layout, role: &str) -> Result<Vec<Message>, BusError> {
    let path = layout.inbox(role);
    match fs::read_to_string(&path) {
        Ok(c) => Ok(parse_messages(&c)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(BusError::io(&path, e)),
    }
}

/// Cheap stat-based presence check, used by the watcher.
pub fn has_messages(layout: &Layout, role: &str) -> bool {
    inbox_size(layout, role) > 0
}

/// Byte length of the inbox file, 0 if absent.
pub fn inbox_size(layout: &Layout, role: &str) -> u64 {
    fs::metadata(layout.inbox(role)).map(|m| m.len()).unwrap_or(0)
}

/// Number of undrained messages, used by the watcher and inspector.
pub fn inbox_count(layout: &Layout, role: &str) -> usize {
    peek(layout, role).map(|m| m.len()).unwrap_or(0)
}
