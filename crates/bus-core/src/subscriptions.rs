//! Subscription Fan-out (component L): durable glob-pattern subscriptions
//! rebroadcasting matching messages without triggering auto-CC or chains.
//!
//! Grounded on the team-mail pub/sub plugin's subscriber struct, adapted
//! from ephemeral in-memory TTL storage to a durable JSONL-backed
//! `Subscription` entity.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::io::entity_store;
use crate::io::error::BusError;
use crate::io::inbox;
use crate::layout::Layout;
use crate::schema::entities::Subscription;
use crate::schema::message::Message;
use globset::Glob;
use uuid::Uuid;

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn glob_match(pattern: &str, value: &str) -> bool {
    Glob::new(pattern)
        .map(|g| g.compile_matcher().is_match(value))
        .unwrap_or(false)
}

pub fn subscribe(
    layout: &Layout,
    subscriber_role: &str,
    event_action_glob: &str,
    source_role_glob: &str,
) -> Result<String, BusError> {
    let id = Uuid::new_v4().to_string();
    let sub = Subscription {
        id: id.clone(),
        subscriber_role: subscriber_role.to_string(),
        event_action_glob: event_action_glob.to_string(),
        source_role_glob: source_role_glob.to_string(),
        enabled: true,
        created_at: now_unix(),
    };
    entity_store::mutate::<Subscription, _>(&layout.subscriptions_jsonl(), |v| v.push(sub))?;
    Ok(id)
}

pub fn unsubscribe(layout: &Layout, id: &str) -> Result<(), BusError> {
    entity_store::mutate::<Subscription, _>(&layout.subscriptions_jsonl(), |v| {
        v.retain(|s| s.id != id)
    })
}

/// On every `Send` — the CLI's `send` command, the webhook's `/send`
/// handler, cron dispatch, and chain dispatch all call this after their
/// own `inbox::send`/`send_no_cc` — reads `subscriptions.jsonl` and emits
/// a `SendNoCC` copy for each enabled match. Refuses to re-fire on its own
/// copies by never matching messages whose `from` is the subscriber's own
/// role, and since fan-out copies always use `send_no_cc`, a copy can
/// never itself trigger another round of fan-out.
pub fn fan_out(layout: &Layout, message: &Message) -> Result<usize, BusError> {
    let subs: Vec<Subscription> = entity_store::read_all(&layout.subscriptions_jsonl())?;
    let mut delivered = 0usize;
    for sub in subs.iter().filter(|s| s.enabled) {
        if sub.subscriber_role == message.from {
            continue;
        }
        if !glob_match(&sub.event_action_glob, &message.action) {
            continue;
        }
        if !glob_match(&sub.source_role_glob, &message.from) {
            continue;
        }
        let mut copy = message.clone();
        copy.to = sub.subscriber_role.clone();
        inbox::send_no_cc(layout, &copy)?;
        delivered += 1;
    }
    Ok(delivered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::message::MessageType;
    use tempfile::TempDir;

    #[test]
    fn fan_out_delivers_to_matching_subscriber() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::from_root(dir.path());
        subscribe(&layout, "docs", "*", "build").unwrap();

        let msg = Message::new("build", "test", MessageType::Event, "compile", "x");
        let delivered = fan_out(&layout, &msg).unwrap();
        assert_eq!(delivered, 1);
        let received = inbox::receive(&layout, "docs").unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].to, "docs");
    }

    #[test]
    fn fan_out_skips_disabled_and_nonmatching() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::from_root(dir.path());
        let id = subscribe(&layout, "docs", "deploy*", "build").unwrap();
        entity_store::mutate::<Subscription, _>(&layout.subscriptions_jsonl(), |v| {
            for s in v.iter_mut() {
                if s.id == id {
                    s.enabled = false;
                }
            }
        })
        .unwrap();

        let msg = Message::new("build", "test", MessageType::Event, "deploy-now", "x");
        let delivered = fan_out(&layout, &msg).unwrap();
        assert_eq!(delivered, 0);
    }

    #[test]
    fn fan_out_never_targets_the_sender() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::from_root(dir.path());
        subscribe(&layout, "build", "*", "*").unwrap();
        let msg = Message::new("build", "test", MessageType::Event, "compile", "x");
        let delivered = fan_out(&layout, &msg).unwrap();
        assert_eq!(delivered, 0);
    }
}
