//! The watcher wakeup trigger: an empty marker file a `notify` watch picks
//! up, letting `bus-cli` cut the watcher's latency down from "next tick" to
//! "immediately" after a `send`, `unlock`, or `notify`.

use crate::layout::Layout;

/// Writes the trigger marker so a running watcher wakes before its next
/// scheduled tick.
pub fn fire(layout: &Layout) -> std::io::Result<()> {
    std::fs::write(layout.trigger_file(), b"")
}

/// Removes the trigger marker; called by the watcher once it has woken.
pub fn drain(layout: &Layout) {
    let _ = std::fs::remove_file(layout.trigger_file());
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn fire_then_drain_round_trips() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::from_root(dir.path());
        fire(&layout).unwrap();
        assert!(layout.trigger_file().exists());
        drain(&layout);
        assert!(!layout.trigger_file().exists());
    }
}
