//! Compaction Guard (component H): per-role size/age scan recommending
//! context compaction.

use crate::layout::Layout;
use crate::schema::entities::SessionMeta;

#[derive(Debug, Clone, PartialEq)]
pub struct CompactionAlert {
    pub key: String,
    pub role: String,
    pub total_bytes: u64,
    pub hours_since_compact: f64,
}

fn file_size(path: &std::path::Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// Sums the inbox, history, memory, and a proportional share of the log
/// for `role`. `memory_bytes` and `log_share_bytes` are supplied by the
/// caller since they depend on roles outside this module's scope (memory
/// lives under the user directory; the log's share is split evenly across
/// active roles by the watcher).
pub fn role_total_bytes(layout: &Layout, role: &str, memory_bytes: u64, log_share_bytes: u64) -> u64 {
    file_size(&layout.inbox(role))
        + file_size(&layout.role_history_jsonl(role))
        + memory_bytes
        + log_share_bytes
}

/// Emits an alert only when both thresholds are met: total bytes and
/// hours-since-last-compact. Uses `start_ts` when never compacted.
pub fn check(
    role: &str,
    total_bytes: u64,
    meta: &SessionMeta,
    now: i64,
    size_threshold_bytes: u64,
    age_threshold_hours: i64,
) -> Option<CompactionAlert> {
    if total_bytes < size_threshold_bytes {
        return None;
    }
    let since = if meta.last_compact_ts > 0 {
        meta.last_compact_ts
    } else {
        meta.start_ts
    };
    let hours = (now - since) as f64 / 3600.0;
    if hours < age_threshold_hours as f64 {
        return None;
    }
    Some(CompactionAlert {
        key: format!("compact:{role}"),
        role: role.to_string(),
        total_bytes,
        hours_since_compact: hours,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_alert_below_size_threshold() {
        let meta = SessionMeta {
            start_ts: 0,
            compact_count: 0,
            last_compact_ts: 0,
        };
        assert!(check("build", 100, &meta, 3 * 3600, 512 * 1024, 2).is_none());
    }

    #[test]
    fn no_alert_below_age_threshold() {
        let meta = SessionMeta {
            start_ts: 0,
            compact_count: 0,
            last_compact_ts: 0,
        };
        assert!(check("build", 600 * 1024, &meta, 3600, 512 * 1024, 2).is_none());
    }

    #[test]
    fn alert_when_both_thresholds_met() {
        let meta = SessionMeta {
            start_ts: 0,
            compact_count: 0,
            last_compact_ts: 0,
        };
        let alert = check("build", 600 * 1024, &meta, 3 * 3600, 512 * 1024, 2).unwrap();
        assert_eq!(alert.key, "compact:build");
    }

    #[test]
    fn uses_last_compact_ts_when_present() {
        let meta = SessionMeta {
            start_ts: 0,
            compact_count: 1,
            last_compact_ts: 3 * 3600 - 60,
        };
        // last_compact_ts is recent even though start_ts is old
        assert!(check("build", 600 * 1024, &meta, 3 * 3600, 512 * 1024, 2).is_none());
    }
}
