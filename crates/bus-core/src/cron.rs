//! Cron Engine (component I): persistent scheduled entries, due-time
//! evaluation, dispatch via the inbox engine, run history.

use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::io::entity_store;
use crate::io::error::BusError;
use crate::io::inbox;
use crate::layout::Layout;
use crate::registry::is_known;
use crate::schema::entities::{CronEntry, CronHistoryEntry};
use crate::schema::message::Message;
use crate::subscriptions;
use regex::Regex;
use uuid::Uuid;

fn every_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^@every\s+(\d+)(s|m|h)$").unwrap())
}

/// Parses `schedule` into a duration in seconds. Rejects durations below
/// 10s to keep a misconfigured entry from hammering the bus.
pub fn parse_schedule_secs(schedule: &str) -> Result<i64, BusError> {
    let lower = schedule.trim();
    if let Some(caps) = every_re().captures(lower) {
        let n: i64 = caps[1].parse().map_err(|_| BusError::InvalidSchedule {
            schedule: schedule.to_string(),
        })?;
        let secs = match &caps[2].to_ascii_lowercase()[..] {
            "s" => n,
            "m" => n * 60,
            "h" => n * 3600,
            _ => {
                return Err(BusError::InvalidSchedule {
                    schedule: schedule.to_string(),
                })
            }
        };
        if secs < 10 {
            return Err(BusError::InvalidSchedule {
                schedule: schedule.to_string(),
            });
        }
        return Ok(secs);
    }
    match lower.to_ascii_lowercase().as_str() {
        "@hourly" => Ok(3600),
        "@daily" => Ok(86400),
        "@half-hourly" => Ok(1800),
        _ => Err(BusError::InvalidSchedule {
            schedule: schedule.to_string(),
        }),
    }
}

/// `CronDue(entry, now)` is monotone in `now` once `last_run_ts` is fixed.
pub fn is_due(entry: &CronEntry, now: i64) -> bool {
    if !entry.enabled {
        return false;
    }
    match parse_schedule_secs(&entry.schedule) {
        Ok(interval) => now - entry.last_run_ts >= interval,
        Err(_) => false,
    }
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// One tick: reads `cron.jsonl`, dispatches every due entry through the
/// inbox engine, appends history, and updates `last_run_ts`/`run_count`.
pub fn run_tick(layout: &Layout) -> Result<Vec<String>, BusError> {
    let now = now_unix();
    let entries: Vec<CronEntry> = entity_store::read_all(&layout.cron_jsonl())?;
    let mut fired = Vec::new();

    for entry in &entries {
        if !is_due(entry, now) {
            continue;
        }
        let msg = Message::new(
            "cron",
            &entry.target,
            entry.msg_type,
            &entry.action,
            &entry.message,
        );
        inbox::send(layout, &msg, false, &[])?;
        subscriptions::fan_out(layout, &msg)?;

        let history = CronHistoryEntry {
            id: Uuid::new_v4().to_string(),
            cron_id: entry.id.clone(),
            fired_at: now,
            target: entry.target.clone(),
            outcome: "dispatched".to_string(),
        };
        entity_store::mutate::<CronHistoryEntry, _>(&layout.cron_history_jsonl(), |v| {
            v.push(history)
        })?;

        fired.push(entry.id.clone());
    }

    if !fired.is_empty() {
        let fired_ids = fired.clone();
        entity_store::mutate::<CronEntry, _>(&layout.cron_jsonl(), |v| {
            for e in v.iter_mut() {
                if fired_ids.contains(&e.id) {
                    e.last_run_ts = now;
                    e.run_count += 1;
                }
            }
        })?;
    }

    Ok(fired)
}

/// Adds a new cron entry, rejecting invalid schedules or unknown targets.
pub fn add(
    layout: &Layout,
    target: &str,
    schedule: &str,
    action: &str,
    message: &str,
    msg_type: crate::schema::message::MessageType,
) -> Result<String, BusError> {
    parse_schedule_secs(schedule)?;
    if !is_known(target) {
        return Err(BusError::UnknownRole {
            role: target.to_string(),
        });
    }
    let id = Uuid::new_v4().to_string();
    let entry = CronEntry {
        id: id.clone(),
        schedule: schedule.to_string(),
        target: target.to_string(),
        action: action.to_string(),
        message: message.to_string(),
        msg_type,
        enabled: true,
        last_run_ts: 0,
        run_count: 0,
        created_at: now_unix(),
    };
    entity_store::mutate::<CronEntry, _>(&layout.cron_jsonl(), |v| v.push(entry))?;
    Ok(id)
}

pub fn remove(layout: &Layout, id: &str) -> Result<(), BusError> {
    entity_store::mutate::<CronEntry, _>(&layout.cron_jsonl(), |v| v.retain(|e| e.id != id))
}

pub fn set_enabled(layout: &Layout, id: &str, enabled: bool) -> Result<(), BusError> {
    entity_store::mutate::<CronEntry, _>(&layout.cron_jsonl(), |v| {
        for e in v.iter_mut() {
            if e.id == id {
                e.enabled = enabled;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::message::MessageType;
    use tempfile::TempDir;

    #[test]
    fn parse_schedule_rejects_too_short() {
        assert!(parse_schedule_secs("@every 5s").is_err());
        assert!(parse_schedule_secs("@every 10s").is_ok());
    }

    #[test]
    fn parse_schedule_accepts_named_schedules() {
        assert_eq!(parse_schedule_secs("@hourly").unwrap(), 3600);
        assert_eq!(parse_schedule_secs("@daily").unwrap(), 86400);
        assert_eq!(parse_schedule_secs("@half-hourly").unwrap(), 1800);
    }

    #[test]
    fn due_true_when_interval_elapsed() {
        let entry = CronEntry {
            id: "1".into(),
            schedule: "@every 5m".into(),
            target: "build".into(),
            action: "run".into(),
            message: "go".into(),
            msg_type: MessageType::Event,
            enabled: true,
            last_run_ts: 1000 - 600,
            run_count: 0,
            created_at: 0,
        };
        assert!(is_due(&entry, 1000));
    }

    #[test]
    fn due_false_when_interval_not_elapsed() {
        let entry = CronEntry {
            id: "1".into(),
            schedule: "@every 5m".into(),
            target: "build".into(),
            action: "run".into(),
            message: "go".into(),
            msg_type: MessageType::Event,
            enabled: true,
            last_run_ts: 1000 - 60,
            run_count: 0,
            created_at: 0,
        };
        assert!(!is_due(&entry, 1000));
    }

    #[test]
    fn tick_dispatches_and_updates_entry() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::from_root(dir.path());
        let id = add(
            &layout,
            "build",
            "@every 10s",
            "nightly",
            "run the thing",
            MessageType::Event,
        )
        .unwrap();

        entity_store::mutate::<CronEntry, _>(&layout.cron_jsonl(), |v| {
            for e in v.iter_mut() {
                if e.id == id {
                    e.last_run_ts = 0;
                }
            }
        })
        .unwrap();

        let fired = run_tick(&layout).unwrap();
        assert_eq!(fired, vec![id.clone()]);

        let received = inbox::receive(&layout, "build").unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].from, "cron");

        let entries: Vec<CronEntry> = entity_store::read_all(&layout.cron_jsonl()).unwrap();
        assert_eq!(entries[0].run_count, 1);
    }

    #[test]
    fn add_rejects_unknown_target() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::from_root(dir.path());
        let result = add(
            &layout,
            "nonsense",
            "@every 10s",
            "x",
            "y",
            MessageType::Event,
        );
        assert!(result.is_err());
    }
}
